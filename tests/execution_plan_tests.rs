use approx::assert_abs_diff_eq;
use digit_vae::backend::ndarray::NdArray;
use digit_vae::backend::Backend;
use digit_vae::engine::optimizer::{Adam, Optimizer};
use digit_vae::engine::tensor::Tensor;
use digit_vae::engine::{build, reset_graph};
use digit_vae::VaeError;

#[test]
fn test_execution_plan_separation() {
    reset_graph::<NdArray>();
    // pを0に近づける損失 L = p
    let p = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![10.0], &[]));
    let loss = p;

    // Adamの最初のステップはおよそlrだけ動く
    let mut optimizer = Adam::new(1.0);
    optimizer.minimize(&loss, &[p]);

    let mut executor = build::<NdArray>();
    assert_eq!(NdArray::to_vec(executor.get_node_data(p.id()).unwrap())[0], 10.0);

    // 推論ステップではパラメータは更新されない
    let out = executor.step_inference(vec![], &[loss]).unwrap();
    assert_eq!(NdArray::to_vec(&out[0])[0], 10.0);
    assert_eq!(
        NdArray::to_vec(executor.get_node_data(p.id()).unwrap())[0],
        10.0,
        "Inference step should not update parameters"
    );

    // 学習ステップでは更新され、フェッチは更新前の値を返す
    let out = executor.step_train(vec![], &[loss]).unwrap();
    assert_eq!(NdArray::to_vec(&out[0])[0], 10.0);
    let p_val = NdArray::to_vec(executor.get_node_data(p.id()).unwrap())[0];
    assert_abs_diff_eq!(p_val, 9.0, epsilon = 1e-3);
}

#[test]
fn inputs_must_be_fed_each_step() {
    reset_graph::<NdArray>();
    let x = Tensor::<NdArray>::new_input(vec![2]);
    let y = x.mul_scalar(2.0);

    let mut executor = build::<NdArray>();
    let out = executor
        .step_inference(vec![(x, NdArray::from_vec(vec![1.0, 2.0], &[2]))], &[y])
        .unwrap();
    assert_eq!(NdArray::to_vec(&out[0]), vec![2.0, 4.0]);

    // 前回の入力は残らない
    let err = executor.step_inference(vec![], &[y]).unwrap_err();
    assert!(matches!(err, VaeError::MissingFeed(id) if id == x.id()));
}

#[test]
fn feed_shape_and_kind_are_checked() {
    reset_graph::<NdArray>();
    let x = Tensor::<NdArray>::new_input(vec![2]);
    let p = Tensor::<NdArray>::new_parameter(NdArray::zeros(&[2]));
    let y = x + p;

    let mut executor = build::<NdArray>();
    let err = executor
        .step_inference(vec![(x, NdArray::zeros(&[3]))], &[y])
        .unwrap_err();
    assert!(matches!(err, VaeError::FeedShape { .. }));

    let err = executor
        .step_inference(vec![(p, NdArray::zeros(&[2]))], &[y])
        .unwrap_err();
    assert!(matches!(err, VaeError::NotAnInput(_)));
}

#[test]
fn parameter_count_includes_adam_state() {
    reset_graph::<NdArray>();
    let p = Tensor::<NdArray>::new_parameter(NdArray::zeros(&[2, 3]));
    let loss = p.square().sum(None);

    let mut optimizer = Adam::new(0.1);
    optimizer.minimize(&loss, &[p]);
    let executor = build::<NdArray>();

    // p(6) + m(6) + v(6) + β1^t + β2^t
    assert_eq!(executor.parameter_count(), 20);
}
