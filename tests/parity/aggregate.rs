//! Column and row aggregates across backends

use blockwise::ops::{col_means, col_moments, col_std_devs, row_std_devs};
use blockwise::runtime::{ExecType, ExecutionContext};

use crate::common::{assert_allclose_f64, assert_parity_f64, random_dense, random_sparse};

#[test]
fn test_col_std_devs_agree_across_backends() {
    let x = random_sparse(60, 9, 0.3, 8, 4, 401);
    let expected = col_std_devs(&ExecutionContext::default(), &x).unwrap();
    for exec_type in ExecType::ALL {
        for partitions in [1, 5] {
            let ctx = ExecutionContext::new(exec_type).with_num_partitions(partitions);
            let got = col_std_devs(&ctx, &x).unwrap();
            assert_parity_f64(&got, &expected, exec_type.name());
        }
    }
}

#[test]
fn test_counts_include_implicit_zeros() {
    let x = random_sparse(33, 6, 0.1, 10, 3, 402);
    for exec_type in ExecType::ALL {
        let moments = col_moments(&ExecutionContext::new(exec_type), &x).unwrap();
        assert_eq!(moments.len(), 6);
        assert!(moments.iter().all(|m| m.count == 33), "{}", exec_type);
    }
}

#[test]
fn test_row_std_devs_agree_across_backends() {
    let x = random_dense(14, 21, 4.0, 4, 6, 403);
    let expected = row_std_devs(&ExecutionContext::default(), &x).unwrap();
    assert_eq!(expected.len(), 14);
    for exec_type in ExecType::ALL {
        let got = row_std_devs(&ExecutionContext::new(exec_type), &x).unwrap();
        assert_parity_f64(&got, &expected, exec_type.name());
    }
}

#[test]
fn test_means_match_two_pass() {
    let x = random_dense(25, 5, 10.0, 7, 2, 404);
    let dense = x.to_dense();
    let expected: Vec<f64> = (0..5)
        .map(|j| (0..25).map(|i| dense.get(i, j)).sum::<f64>() / 25.0)
        .collect();
    for exec_type in ExecType::ALL {
        let got = col_means(&ExecutionContext::new(exec_type), &x).unwrap();
        assert_allclose_f64(&got, &expected, 1e-12, 1e-12, exec_type.name());
    }
}
