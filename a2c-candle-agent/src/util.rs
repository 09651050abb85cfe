//! Utilities.
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor, Var, D};
use candle_nn::ops::log_softmax;
use ndarray::{Array2, Array3};
use rand::Rng;

/// Converts an array to a tensor on `device`.
pub fn array3_to_tensor(a: &Array3<f32>, device: &Device) -> Result<Tensor> {
    let t = Tensor::from_iter(a.iter().copied(), device)?;
    Ok(t.reshape(a.dim())?)
}

/// Converts an array to a tensor on `device`.
pub fn array2_to_tensor(a: &Array2<f32>, device: &Device) -> Result<Tensor> {
    let t = Tensor::from_iter(a.iter().copied(), device)?;
    Ok(t.reshape(a.dim())?)
}

/// Converts a 2-dimensional tensor to an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let (n, m) = t.dims2()?;
    let v: Vec<f32> = t.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
    Ok(Array2::from_shape_vec((n, m), v)?)
}

/// Converts flags to a `[n]` tensor of `0.0` and `1.0`.
pub fn flags_to_tensor(flags: &[bool], device: &Device) -> Result<Tensor> {
    let v = flags.iter().map(|&f| if f { 1f32 } else { 0f32 });
    Ok(Tensor::from_iter(v, device)?)
}

/// Entropy of the categorical distributions given by rows of `logits`.
pub fn entropy(logits: &Tensor) -> Result<Tensor> {
    let log_p = log_softmax(logits, D::Minus1)?;
    let p = log_p.exp()?;
    Ok((p * log_p)?.sum(D::Minus1)?.neg()?)
}

/// `-log pi(a_i)` of the categorical distributions given by rows of `logits`.
pub fn neg_log_prob(logits: &Tensor, actions: &Tensor) -> Result<Tensor> {
    let log_p = log_softmax(logits, D::Minus1)?;
    let ix = actions.to_dtype(DType::U32)?.unsqueeze(1)?;
    Ok(log_p.gather(&ix, 1)?.squeeze(1)?.neg()?)
}

/// Elements `x[i, a_i]`.
pub fn gather_actions(x: &Tensor, actions: &Tensor) -> Result<Tensor> {
    let ix = actions.to_dtype(DType::U32)?.unsqueeze(1)?;
    Ok(x.gather(&ix, 1)?.squeeze(1)?)
}

/// Samples an index per row of `logits` with the Gumbel-max trick.
pub fn sample_categorical<R: Rng>(logits: &Array2<f32>, rng: &mut R) -> Vec<usize> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = (0, f32::NEG_INFINITY);
            for (i, &l) in row.iter().enumerate() {
                let u: f32 = rng.gen_range(f32::MIN_POSITIVE..1.0);
                let g = l - (-u.ln()).ln();
                if g > best.1 {
                    best = (i, g);
                }
            }
            best.0
        })
        .collect()
}

/// Global L2 norm of the gradients of `vars`.
pub fn global_grad_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut sq = 0f32;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq += g.sqr()?.sum_all()?.to_dtype(DType::F32)?.to_scalar::<f32>()?;
        }
    }
    Ok(sq.sqrt())
}

/// Rescales the gradients of `vars` so that their global norm is at most `max_norm`.
///
/// Every gradient is multiplied by the same factor `max_norm / norm`. Returns the norm
/// before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f32) -> Result<f32> {
    let norm = global_grad_norm(grads, vars)?;
    if norm > max_norm {
        let scale = (max_norm / norm) as f64;
        for var in vars.iter() {
            if let Some(g) = grads.get(var.as_tensor()) {
                let g = g.affine(scale, 0.0)?;
                grads.insert(var.as_tensor(), g);
            }
        }
    }
    Ok(norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::SmallRng, SeedableRng};

    fn grads() -> Result<(GradStore, Vec<Var>)> {
        let a = Var::from_tensor(&Tensor::new(&[1f32, 2., 3.], &Device::Cpu)?)?;
        let b = Var::from_tensor(&Tensor::new(&[[0.5f32, -1.0], [2.0, 0.0]], &Device::Cpu)?)?;
        // d/da = 2a, d/db = 3
        let loss = (a.as_tensor().sqr()?.sum_all()? + b.as_tensor().affine(3.0, 0.0)?.sum_all()?)?;
        Ok((loss.backward()?, vec![a, b]))
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let (mut store, vars) = grads()?;
        let before = vars
            .iter()
            .map(|v| Ok(store.get(v.as_tensor()).unwrap().flatten_all()?.to_vec1::<f32>()?))
            .collect::<Result<Vec<_>>>()?;
        let norm = clip_grad_norm(&mut store, &vars, 0.5)?;

        // 4 + 16 + 36 + 4 * 9
        assert!((norm - 92f32.sqrt()).abs() < 1e-4);
        assert!((global_grad_norm(&store, &vars)? - 0.5).abs() < 1e-5);

        let scale = 0.5 / norm;
        for (v, g0) in vars.iter().zip(before) {
            let g = store.get(v.as_tensor()).unwrap().flatten_all()?.to_vec1::<f32>()?;
            for (x, x0) in g.iter().zip(g0) {
                assert!((x - x0 * scale).abs() < 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn test_small_gradients_are_untouched() -> Result<()> {
        let (mut store, vars) = grads()?;
        let norm = clip_grad_norm(&mut store, &vars, 100.0)?;
        assert!((global_grad_norm(&store, &vars)? - norm).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_entropy_and_neg_log_prob() -> Result<()> {
        let logits = Tensor::new(&[[0f32, 0.], [10., -10.]], &Device::Cpu)?;
        let h = entropy(&logits)?.to_vec1::<f32>()?;
        assert!((h[0] - 2f32.ln()).abs() < 1e-5);
        assert!(h[1] < 1e-5);

        let actions = Tensor::new(&[1u32, 0], &Device::Cpu)?;
        let nlp = neg_log_prob(&logits, &actions)?.to_vec1::<f32>()?;
        assert!((nlp[0] - 2f32.ln()).abs() < 1e-5);
        assert!(nlp[1] < 1e-5);
        Ok(())
    }

    #[test]
    fn test_sample_categorical() {
        let mut rng = SmallRng::seed_from_u64(42);
        let logits = array![[0.0, 50.0, 0.0], [0.0, 0.0, 0.0]];
        let mut counts = [0usize; 3];
        for _ in 0..300 {
            let acts = sample_categorical(&logits, &mut rng);
            assert_eq!(acts[0], 1);
            counts[acts[1]] += 1;
        }
        assert!(counts.iter().all(|&c| c > 50));
    }

    #[test]
    fn test_array_conversion() -> Result<()> {
        let a = array![[1f32, 2., 3.], [4., 5., 6.]];
        let t = array2_to_tensor(&a, &Device::Cpu)?;
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(tensor_to_array2(&t)?, a);
        Ok(())
    }
}
