use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    ApproximatorOptions, AssociationMethod, FitError, PointOrdering, PointSet, associate,
};

fn random_walk(rng: &mut StdRng, n: usize, dims: usize) -> PointSet {
    let mut p = [0.0_f64; 3];
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            for c in p.iter_mut().take(dims) {
                *c += rng.random_range(-1.0..1.0);
            }
            p[..dims].to_vec()
        })
        .collect();
    PointSet::from_rows(&rows).unwrap()
}

#[test]
fn chord_length_spans_unit_interval_and_never_decreases() {
    let mut rng = StdRng::seed_from_u64(7);
    let options = ApproximatorOptions::default();
    for (n, dims) in [(4, 2), (17, 3), (120, 2), (300, 3)] {
        let points = random_walk(&mut rng, n, dims);
        let params = associate(&points, AssociationMethod::ChordLength, &options).unwrap();
        assert_eq!(params.len(), n);
        assert_eq!(params[0], 0.0);
        assert_eq!(params[n - 1], 1.0);
        assert!(params.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn xyz_norm_spans_unit_interval_and_never_decreases() {
    let mut rng = StdRng::seed_from_u64(11);
    let points = random_walk(&mut rng, 50, 3);
    let params =
        associate(&points, AssociationMethod::XyzNorm, &ApproximatorOptions::default()).unwrap();
    assert_eq!(params.len(), 50);
    assert_eq!(params[0], 0.0);
    assert_eq!(params[49], 1.0);
    assert!(params.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn three_points_are_insufficient_for_every_method() {
    let points = PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]).unwrap();
    for method in AssociationMethod::ALL {
        assert_eq!(
            associate(&points, method, &ApproximatorOptions::default()),
            Err(FitError::InsufficientData {
                provided: 3,
                required: 4
            })
        );
    }
}

#[test]
fn coincident_points_are_degenerate() {
    let points = PointSet::from_xy(&[[1.0, 1.0]; 6]).unwrap();
    for method in AssociationMethod::ALL {
        assert!(matches!(
            associate(&points, method, &ApproximatorOptions::default()),
            Err(FitError::DegenerateInput { .. })
        ));
    }
}

#[test]
fn parameters_do_not_depend_on_scale() {
    let mut rng = StdRng::seed_from_u64(23);
    let points = random_walk(&mut rng, 40, 2);
    let options = ApproximatorOptions::default();
    for scale in [1e-12, 1e-6, 1e6] {
        let rows: Vec<[f64; 2]> = points.iter().map(|p| [p.x * scale, p.y * scale]).collect();
        let scaled = PointSet::from_xy(&rows).unwrap();
        for method in [AssociationMethod::ChordLength, AssociationMethod::XyzNorm] {
            let expected = associate(&points, method, &options).unwrap();
            let params = associate(&scaled, method, &options).unwrap();
            for (a, b) in expected.iter().zip(&params) {
                assert!((a - b).abs() < 1e-9, "{method} at scale {scale}");
            }
        }
    }

    let tiny = PointSet::from_xy(&[[0.0, 0.0], [1e-13, 0.0], [2e-13, 1e-13], [3e-13, 0.0]]).unwrap();
    assert!(associate(&tiny, AssociationMethod::ChordLength, &options).is_ok());
}

#[test]
fn duplicate_consecutive_points_share_a_parameter() {
    let points =
        PointSet::from_xy(&[[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]).unwrap();
    let params = associate(
        &points,
        AssociationMethod::ChordLength,
        &ApproximatorOptions::default(),
    )
    .unwrap();
    assert_eq!(params[1], params[2]);
}

#[test]
fn anisotropic_set_separates_chord_length_from_xyz_norm() {
    // Spread ten times wider in x than in y.
    let points = PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [5.0, 1.0], [10.0, 0.0]]).unwrap();
    let options = ApproximatorOptions::default();
    let chord = associate(&points, AssociationMethod::ChordLength, &options).unwrap();
    let norm = associate(&points, AssociationMethod::XyzNorm, &options).unwrap();

    assert_eq!(chord.len(), points.len());
    assert_eq!(norm.len(), points.len());
    assert!((chord[1] - norm[1]).abs() > 0.1);

    // Same index correspondence: both orderings sort the points identically.
    let order = |params: &[f64]| {
        let mut idx: Vec<usize> = (0..params.len()).collect();
        idx.sort_by(|&a, &b| params[a].total_cmp(&params[b]));
        idx
    };
    assert_eq!(order(&chord), order(&norm));
    assert_eq!(order(&chord), vec![0, 1, 2, 3]);
}

#[test]
fn principal_axis_ordering_scatters_parameters_back_to_input_indices() {
    let xs = [6.0, 0.0, 9.0, 3.0, 10.0, 1.0, 4.0];
    let rows: Vec<[f64; 2]> = xs.iter().map(|&x| [x, 0.25 * x]).collect();
    let points = PointSet::from_xy(&rows).unwrap();
    let options = ApproximatorOptions::default().with_ordering(PointOrdering::PrincipalAxis);
    let params = associate(&points, AssociationMethod::ChordLength, &options).unwrap();

    let forward = xs.iter().zip(&params).all(|(x, t)| (t - x / 10.0).abs() < 1e-12);
    let backward = xs.iter().zip(&params).all(|(x, t)| (t - (1.0 - x / 10.0)).abs() < 1e-12);
    assert!(forward || backward, "{params:?}");
}

#[test]
fn iterative_parameters_stay_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(3);
    let rows: Vec<[f64; 2]> = (0..40)
        .map(|i| {
            let x = f64::from(i) * 0.5;
            [x, (x / 3.0).sin() + rng.random_range(-0.05..0.05)]
        })
        .collect();
    let points = PointSet::from_xy(&rows).unwrap();
    let params = associate(
        &points,
        AssociationMethod::Iterative,
        &ApproximatorOptions::default(),
    )
    .unwrap();

    assert_eq!(params.len(), 40);
    assert!(params.iter().all(|t| (0.0..=1.0).contains(t)));
    assert_eq!(params.iter().copied().fold(f64::INFINITY, f64::min), 0.0);
    assert_eq!(params.iter().copied().fold(f64::NEG_INFINITY, f64::max), 1.0);
}

#[test]
fn invalid_options_are_reported_before_association() {
    let points = PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]]).unwrap();
    let options = ApproximatorOptions::default().with_max_iter(0);
    assert!(matches!(
        associate(&points, AssociationMethod::ChordLength, &options),
        Err(FitError::InvalidInput { .. })
    ));
}
