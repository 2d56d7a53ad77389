use ndarray::{s, Array2, ArrayD, Axis, Ix2, Zip};
use ndarray_rand::{rand_distr::StandardNormal, RandomExt};
use rand::Rng;

use crate::backend::{Backend, Elm};

#[derive(Debug, Clone, Copy)]
pub struct NdArray;

fn as_matrix(tensor: &ArrayD<Elm>) -> ndarray::ArrayView2<'_, Elm> {
    tensor
        .view()
        .into_dimensionality::<Ix2>()
        .unwrap_or_else(|_| panic!("Expected a 2D tensor, got shape {:?}", tensor.shape()))
}

fn softplus(v: Elm) -> Elm {
    v.max(0.0) + (-v.abs()).exp().ln_1p()
}

impl Backend for NdArray {
    type Tensor = ArrayD<Elm>;

    fn zeros(shape: &[usize]) -> Self::Tensor {
        ArrayD::zeros(shape)
    }
    fn ones(shape: &[usize]) -> Self::Tensor {
        ArrayD::ones(shape)
    }
    fn ones_like(tensor: &Self::Tensor) -> Self::Tensor {
        ArrayD::ones(tensor.shape())
    }
    fn full(shape: &[usize], value: Elm) -> Self::Tensor {
        ArrayD::from_elem(shape, value)
    }
    fn random_normal<R: Rng + ?Sized>(
        shape: &[usize],
        mean: Elm,
        std: Elm,
        rng: &mut R,
    ) -> Self::Tensor {
        let standard: ArrayD<Elm> = ArrayD::random_using(shape, StandardNormal, rng);
        standard.mapv(|v| mean + std * v)
    }
    fn truncated_normal<R: Rng + ?Sized>(
        shape: &[usize],
        mean: Elm,
        std: Elm,
        rng: &mut R,
    ) -> Self::Tensor {
        ArrayD::from_shape_simple_fn(shape, || loop {
            let v: Elm = rng.sample(StandardNormal);
            if v.abs() <= 2.0 {
                break mean + std * v;
            }
        })
    }

    fn from_vec(vec: Vec<Elm>, shape: &[usize]) -> Self::Tensor {
        ArrayD::from_shape_vec(shape, vec).unwrap_or_else(|e| {
            panic!("Data does not fit shape {:?}: {}", shape, e);
        })
    }
    fn to_vec(tensor: &Self::Tensor) -> Vec<Elm> {
        tensor.iter().cloned().collect()
    }

    fn shape(tensor: &Self::Tensor) -> Vec<usize> {
        tensor.shape().to_vec()
    }

    // ndarrayの二項演算は両辺のブロードキャストに対応している
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a + b
    }
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a - b
    }
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a * b
    }
    fn div(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        a / b
    }
    // 行列積は2次元同士のみ対応する
    fn matmul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor {
        as_matrix(a).dot(&as_matrix(b)).into_dyn()
    }

    fn transpose(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.t().to_owned()
    }

    fn reshape(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor {
        // 論理順で並べ直すので、メモリレイアウトに依存しない
        Self::from_vec(tensor.iter().cloned().collect(), shape)
    }

    fn broadcast(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor {
        tensor
            .broadcast(shape)
            .unwrap_or_else(|| {
                panic!(
                    "Broadcast failed: shape={:?}, target={:?}",
                    tensor.shape(),
                    shape
                )
            })
            .to_owned()
    }

    fn sum_to(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor {
        let mut out = tensor.clone();
        // 先頭に追加された次元を潰す
        while out.ndim() > shape.len() {
            out = out.sum_axis(Axis(0));
        }
        // サイズ1へブロードキャストされた次元を潰す(次元は残す)
        for (ax, &dim) in shape.iter().enumerate() {
            if dim == 1 && out.shape()[ax] != 1 {
                out = out.sum_axis(Axis(ax)).insert_axis(Axis(ax));
            }
        }
        out
    }

    fn slice_cols(tensor: &Self::Tensor, start: usize, end: usize) -> Self::Tensor {
        as_matrix(tensor).slice(s![.., start..end]).to_owned().into_dyn()
    }

    fn pad_cols(tensor: &Self::Tensor, start: usize, width: usize) -> Self::Tensor {
        let inner = as_matrix(tensor);
        let (rows, cols) = inner.dim();
        let mut out = Array2::<Elm>::zeros((rows, width));
        out.slice_mut(s![.., start..start + cols]).assign(&inner);
        out.into_dyn()
    }

    fn sum(a: &Self::Tensor, axis: Option<usize>) -> Self::Tensor {
        match axis {
            Some(ax) => a.sum_axis(Axis(ax)),
            None => ArrayD::from_elem(vec![], a.sum()),
        }
    }

    fn neg(a: &Self::Tensor) -> Self::Tensor {
        -a
    }

    fn sigmoid(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn tanh(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| v.tanh())
    }

    fn relu(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| v.max(0.0))
    }

    fn step(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
    }

    fn softplus(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(softplus)
    }

    fn log(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| v.ln())
    }

    fn exp(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| v.exp())
    }

    fn sqrt(a: &Self::Tensor) -> Self::Tensor {
        a.mapv(|v| v.sqrt())
    }

    fn powi(a: &Self::Tensor, n: i32) -> Self::Tensor {
        a.mapv(|v| v.powi(n))
    }

    fn sigmoid_cross_entropy(logits: &Self::Tensor, labels: &Self::Tensor) -> Self::Tensor {
        Zip::from(logits)
            .and(labels)
            .map_collect(|&l, &z| l.max(0.0) - l * z + (-l.abs()).exp().ln_1p())
    }
}
