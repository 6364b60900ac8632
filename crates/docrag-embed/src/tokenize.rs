use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encode one text as `(input_ids, attention_mask)`, both shaped `[1, T]`
/// with `T <= max_len`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len {
        ids.truncate(max_len);
        mask.truncate(max_len);
    }
    let input_ids = Tensor::new(ids.as_slice(), device)?.unsqueeze(0)?;
    let attention_mask = Tensor::new(mask.as_slice(), device)?.unsqueeze(0)?;
    Ok((input_ids, attention_mask))
}
