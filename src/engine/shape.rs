use super::node::OpType;

pub fn compute_shape(op_type: &OpType, input_shapes: &[&[usize]]) -> Result<Vec<usize>, String> {
    let arity = |n: usize| -> Result<(), String> {
        if input_shapes.len() != n {
            return Err(format!(
                "{:?} requires {} inputs, got {}",
                op_type,
                n,
                input_shapes.len()
            ));
        }
        Ok(())
    };

    match op_type {
        OpType::Add | OpType::Sub | OpType::Mul | OpType::Div => {
            arity(2)?;
            broadcast_shape(input_shapes[0], input_shapes[1])
        }
        OpType::Matmul => {
            arity(2)?;
            compute_matmul_shape(input_shapes[0], input_shapes[1])
        }
        OpType::Transpose => {
            arity(1)?;
            compute_transpose_shape(input_shapes[0])
        }
        OpType::Sum { axis } => {
            arity(1)?;
            compute_sum_shape(input_shapes[0], *axis)
        }
        OpType::SumTo { shape } => {
            arity(1)?;
            // shapeからinputへブロードキャストできることが条件
            let back = broadcast_shape(shape, input_shapes[0])?;
            if back.as_slice() != input_shapes[0] {
                return Err(format!(
                    "SumTo: {:?} does not broadcast to {:?}",
                    shape, input_shapes[0]
                ));
            }
            Ok(shape.clone())
        }
        OpType::BroadcastTo { shape } => {
            arity(1)?;
            let out = broadcast_shape(input_shapes[0], shape)?;
            if &out != shape {
                return Err(format!(
                    "Broadcast failed: shape={:?}, target={:?}",
                    input_shapes[0], shape
                ));
            }
            Ok(out)
        }
        OpType::Reshape { shape } => {
            arity(1)?;
            let from: usize = input_shapes[0].iter().product();
            let to: usize = shape.iter().product();
            if from != to {
                return Err(format!(
                    "Reshape: cannot reshape {:?} into {:?}",
                    input_shapes[0], shape
                ));
            }
            Ok(shape.clone())
        }
        OpType::SliceCols { start, end } => {
            arity(1)?;
            let a = input_shapes[0];
            if a.len() != 2 || start > end || *end > a[1] {
                return Err(format!(
                    "SliceCols {}..{} out of bounds for shape {:?}",
                    start, end, a
                ));
            }
            Ok(vec![a[0], end - start])
        }
        OpType::PadCols { start, width } => {
            arity(1)?;
            let a = input_shapes[0];
            if a.len() != 2 || start + a[1] > *width {
                return Err(format!(
                    "PadCols at {} does not fit {:?} into width {}",
                    start, a, width
                ));
            }
            Ok(vec![a[0], *width])
        }
        OpType::AddN => {
            if input_shapes.is_empty() {
                return Err("AddN requires at least 1 input".to_string());
            }
            let first_shape = input_shapes[0];
            for (i, shape) in input_shapes.iter().enumerate().skip(1) {
                if *shape != first_shape {
                    return Err(format!(
                        "AddN shape mismatch at index {}: expected {:?}, got {:?}",
                        i, first_shape, shape
                    ));
                }
            }
            Ok(first_shape.to_vec())
        }
        OpType::SigmoidCrossEntropy => {
            arity(2)?;
            if input_shapes[0] != input_shapes[1] {
                return Err(format!(
                    "SigmoidCrossEntropy: logits {:?} and labels {:?} differ",
                    input_shapes[0], input_shapes[1]
                ));
            }
            Ok(input_shapes[0].to_vec())
        }
        OpType::Neg
        | OpType::OnesLike
        | OpType::Sigmoid
        | OpType::Tanh
        | OpType::ReLU
        | OpType::Step
        | OpType::Softplus
        | OpType::Exp
        | OpType::Log
        | OpType::Sqrt
        | OpType::Powi { .. }
        | OpType::Identity => {
            arity(1)?;
            Ok(input_shapes[0].to_vec())
        }
    }
}

pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, String> {
    let a_len = a.len();
    let b_len = b.len();
    let max_len = a_len.max(b_len);
    let mut result = Vec::with_capacity(max_len);

    for i in 0..max_len {
        let a_dim = if i < max_len - a_len {
            1
        } else {
            a[i - (max_len - a_len)]
        };
        let b_dim = if i < max_len - b_len {
            1
        } else {
            b[i - (max_len - b_len)]
        };

        if a_dim == b_dim {
            result.push(a_dim);
        } else if a_dim == 1 {
            result.push(b_dim);
        } else if b_dim == 1 {
            result.push(a_dim);
        } else {
            return Err(format!(
                "Broadcast failed: dimension mismatch at index {} (from right): {} vs {} (shapes: {:?}, {:?})",
                max_len - i - 1, a_dim, b_dim, a, b
            ));
        }
    }
    Ok(result)
}

fn compute_matmul_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, String> {
    if a.len() != 2 || b.len() != 2 {
        return Err(format!(
            "Matmul requires 2D inputs (e.g. [Batch, In] x [In, Out]), got {:?} x {:?}",
            a, b
        ));
    }
    if a[1] != b[0] {
        return Err(format!(
            "Matmul shape mismatch: inner dimensions MUST match. {:?} x {:?} ({} != {})",
            a, b, a[1], b[0]
        ));
    }
    Ok(vec![a[0], b[1]])
}

fn compute_transpose_shape(a: &[usize]) -> Result<Vec<usize>, String> {
    // 全軸を反転する(2次元なら通常の転置)
    Ok(a.iter().rev().cloned().collect())
}

fn compute_sum_shape(a: &[usize], axis: Option<usize>) -> Result<Vec<usize>, String> {
    match axis {
        Some(ax) => {
            if ax >= a.len() {
                return Err(format!("Sum axis {} out of bounds for shape {:?}", ax, a));
            }
            let mut shape = a.to_vec();
            shape.remove(ax);
            Ok(shape)
        }
        None => Ok(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_broadcasts_over_batch() {
        assert_eq!(broadcast_shape(&[4, 3], &[3]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shape(&[], &[2, 5]).unwrap(), vec![2, 5]);
        assert!(broadcast_shape(&[2, 3], &[2, 4]).is_err());
    }

    #[test]
    fn sum_to_requires_broadcast_compatible_target() {
        let op = OpType::SumTo { shape: vec![3] };
        assert_eq!(compute_shape(&op, &[&[4, 3]]).unwrap(), vec![3]);
        let bad = OpType::SumTo { shape: vec![2] };
        assert!(compute_shape(&bad, &[&[4, 3]]).is_err());
    }

    #[test]
    fn slice_cols_checks_bounds() {
        let op = OpType::SliceCols { start: 2, end: 4 };
        assert_eq!(compute_shape(&op, &[&[5, 4]]).unwrap(), vec![5, 2]);
        let op = OpType::SliceCols { start: 2, end: 6 };
        assert!(compute_shape(&op, &[&[5, 4]]).is_err());
    }
}
