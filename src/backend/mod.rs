use std::fmt::Debug;

use rand::Rng;

pub mod ndarray;

pub type Elm = f32;

pub trait Backend: Clone + Debug {
    type Tensor: Clone + Debug;

    fn zeros(shape: &[usize]) -> Self::Tensor;
    fn ones(shape: &[usize]) -> Self::Tensor;
    fn ones_like(tensor: &Self::Tensor) -> Self::Tensor;
    fn full(shape: &[usize], value: Elm) -> Self::Tensor;
    fn random_normal<R: Rng + ?Sized>(
        shape: &[usize],
        mean: Elm,
        std: Elm,
        rng: &mut R,
    ) -> Self::Tensor;
    // 平均から2σ以上離れた値は引き直す
    fn truncated_normal<R: Rng + ?Sized>(
        shape: &[usize],
        mean: Elm,
        std: Elm,
        rng: &mut R,
    ) -> Self::Tensor;

    // CPU配列からの作成
    fn from_vec(vec: Vec<Elm>, shape: &[usize]) -> Self::Tensor;
    // CPU配列への変換(基本的に重い処理となる)
    fn to_vec(tensor: &Self::Tensor) -> Vec<Elm>;

    fn shape(tensor: &Self::Tensor) -> Vec<usize>;

    // 基本的な演算(全て新しいTensorを返す)
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor; // 要素ごとの積
    fn div(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;
    fn matmul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor; // 行列積

    fn transpose(tensor: &Self::Tensor) -> Self::Tensor;
    fn reshape(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor;
    fn broadcast(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor;
    /// Sums `tensor` down to `shape`, undoing a broadcast.
    fn sum_to(tensor: &Self::Tensor, shape: &[usize]) -> Self::Tensor;

    /// Columns `start..end` of a 2D tensor.
    fn slice_cols(tensor: &Self::Tensor, start: usize, end: usize) -> Self::Tensor;
    /// Places a 2D tensor at column `start` of a zero matrix `width` columns wide.
    fn pad_cols(tensor: &Self::Tensor, start: usize, width: usize) -> Self::Tensor;

    fn sum(a: &Self::Tensor, axis: Option<usize>) -> Self::Tensor;

    fn neg(a: &Self::Tensor) -> Self::Tensor;

    fn sigmoid(a: &Self::Tensor) -> Self::Tensor;
    fn tanh(a: &Self::Tensor) -> Self::Tensor;
    fn relu(a: &Self::Tensor) -> Self::Tensor;
    fn step(a: &Self::Tensor) -> Self::Tensor;
    fn softplus(a: &Self::Tensor) -> Self::Tensor;
    fn log(a: &Self::Tensor) -> Self::Tensor;
    fn exp(a: &Self::Tensor) -> Self::Tensor;
    fn sqrt(a: &Self::Tensor) -> Self::Tensor;
    fn powi(a: &Self::Tensor, n: i32) -> Self::Tensor;

    /// Elementwise `max(l, 0) - l * z + ln(1 + exp(-|l|))` for logits `l` and labels `z`.
    fn sigmoid_cross_entropy(logits: &Self::Tensor, labels: &Self::Tensor) -> Self::Tensor;
}
