pub mod backend;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod train;
pub mod vis;

pub use error::{Result, VaeError};

#[cfg(test)]
mod tests {
    use crate::backend::ndarray::NdArray;
    use crate::backend::Backend;
    use crate::engine::{build, reset_graph};
    use crate::engine::tensor::Tensor;

    type T = Tensor<NdArray>;

    #[test]
    fn test_add() {
        reset_graph::<NdArray>();
        let a_data = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3]);
        let b_data = NdArray::from_vec(vec![4.0, 5.0, 6.0], &[3]);
        let a = T::new_input(vec![3]);
        let b = T::new_input(vec![3]);

        // 出力先のパラメータ
        let output = T::new_parameter(NdArray::zeros(&[3]));

        let c = a + b;
        let _assign = T::assign(&output, &c);

        let mut executor = build::<NdArray>();
        executor
            .step_train(vec![(a, a_data), (b, b_data)], &[])
            .unwrap();

        let result = executor.get_node_data(output.id()).unwrap();
        assert_eq!(
            NdArray::to_vec(result),
            vec![1.0 + 4.0, 2.0 + 5.0, 3.0 + 6.0]
        );
    }

    #[test]
    fn matmul() {
        reset_graph::<NdArray>();
        let a_data = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b_data = NdArray::from_vec(vec![5.0, 6.0, 7.0, 8.0], &[2, 2]);
        let a = T::new_input(vec![2, 2]);
        let b = T::new_input(vec![2, 2]);

        let c = a.matmul(b);

        let mut executor = build::<NdArray>();
        let out = executor
            .step_inference(vec![(a, a_data), (b, b_data)], &[c])
            .unwrap();

        // [[1, 2], [3, 4]] @ [[5, 6], [7, 8]] = [[19, 22], [43, 50]]
        assert_eq!(NdArray::to_vec(&out[0]), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    #[should_panic(expected = "Shape mismatch")]
    fn matmul_shape_mismatch_panics() {
        reset_graph::<NdArray>();
        let a = T::new_input(vec![2, 3]);
        let b = T::new_input(vec![2, 3]);
        let _ = a.matmul(b);
    }

    #[test]
    fn assign_accumulates_across_steps() {
        reset_graph::<NdArray>();
        let counter = T::new_parameter(NdArray::zeros(&[]));
        let _ = T::assign(&counter, &counter.add_scalar(1.0));

        let mut executor = build::<NdArray>();
        for _ in 0..3 {
            executor.step_train(vec![], &[]).unwrap();
        }
        let value = executor.get_node_data(counter.id()).unwrap();
        assert_eq!(NdArray::to_vec(value), vec![3.0]);
    }

    #[test]
    fn grad_of_square() {
        reset_graph::<NdArray>();
        let x = T::new_parameter(NdArray::from_vec(vec![3.0], &[]));
        let y = x.square();
        let dy_dx = y.grad(&x);

        let mut executor = build::<NdArray>();
        let out = executor.step_inference(vec![], &[dy_dx]).unwrap();
        assert_eq!(NdArray::to_vec(&out[0]), vec![6.0]);
    }
}
