use digit_vae::backend::ndarray::NdArray;
use digit_vae::backend::Backend;
use digit_vae::engine::optimizer::{Adam, Optimizer};
use digit_vae::engine::tensor::Tensor;
use digit_vae::engine::{build, reset_graph};

#[test]
fn test_adam_convergence() {
    reset_graph::<NdArray>();
    // y = x^2 をx=2から最小化する
    let x = Tensor::<NdArray>::new_parameter(NdArray::from_vec(vec![2.0], &[1]));
    let loss = x.square().sum(None);

    let mut optimizer = Adam::new(0.1);
    optimizer.minimize(&loss, &[x]);

    let mut executor = build::<NdArray>();
    for _ in 0..200 {
        executor.step_train(vec![], &[]).unwrap();
    }

    let val = NdArray::to_vec(executor.get_node_data(x.id()).unwrap())[0];
    assert!(val.abs() < 0.1, "Adam did not converge, got {}", val);
}

#[test]
fn adam_updates_every_parameter_once_per_step() {
    reset_graph::<NdArray>();
    // L = sum((w - 3)^2) + sum((b + 1)^2)
    let w = Tensor::<NdArray>::new_parameter(NdArray::zeros(&[2, 2]));
    let b = Tensor::<NdArray>::new_parameter(NdArray::zeros(&[2]));
    let loss = w.add_scalar(-3.0).square().sum(None) + b.add_scalar(1.0).square().sum(None);

    let mut optimizer = Adam::new(0.05);
    optimizer.minimize(&loss, &[w, b]);

    let mut executor = build::<NdArray>();
    let first = executor.step_train(vec![], &[loss]).unwrap();
    assert_eq!(NdArray::to_vec(&first[0])[0], 4.0 * 9.0 + 2.0);

    // 最初のステップは各要素がlrだけ勾配の逆方向に動く
    let w_val = NdArray::to_vec(executor.get_node_data(w.id()).unwrap());
    let b_val = NdArray::to_vec(executor.get_node_data(b.id()).unwrap());
    for v in w_val {
        assert!((v - 0.05).abs() < 1e-4, "w moved to {}", v);
    }
    for v in b_val {
        assert!((v + 0.05).abs() < 1e-4, "b moved to {}", v);
    }

    for _ in 0..400 {
        executor.step_train(vec![], &[]).unwrap();
    }
    let last = executor.step_inference(vec![], &[loss]).unwrap();
    assert!(NdArray::to_vec(&last[0])[0] < 0.05);
}
