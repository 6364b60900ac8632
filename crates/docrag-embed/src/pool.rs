use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean of the hidden states over unmasked tokens, L2-normalized.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` (any numeric dtype).
/// Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, hidden_dim) = hidden.dims3()?;
    ensure!(attention_mask.dims().len() == 2, "attention mask must be [B,T], got {:?}", attention_mask.dims());

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.maximum(1f64)?;
    let mean = summed.broadcast_div(&counts)?;

    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let normalized = mean.broadcast_div(&norm)?;
    ensure!(normalized.dims() == [batch, hidden_dim], "unexpected pooled shape {:?}", normalized.dims());
    Ok(normalized)
}
