use crate::geom::{
    BSplineCurve, CatmullRomSplineList, Curve3, FitError, Point3, PointSet, parameters_by_count,
    sample_curve_uniform,
};

fn quarter_bezier() -> BSplineCurve {
    BSplineCurve::new(
        3,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 4.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
        ],
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        2,
    )
    .unwrap()
}

#[test]
fn parameters_by_count_hits_domain_ends() {
    assert!(parameters_by_count((0.0, 1.0), 0).is_empty());
    assert_eq!(parameters_by_count((2.0, 5.0), 1), vec![2.0]);
    assert_eq!(parameters_by_count((0.0, 1.0), 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);

    let params = parameters_by_count((0.1, 0.7), 13);
    assert_eq!(params[0], 0.1);
    assert_eq!(params[12], 0.7);
}

#[test]
fn sample_curve_uniform_works_for_any_curve() {
    let bezier = quarter_bezier();
    let samples = sample_curve_uniform(&bezier, 11);
    assert_eq!(samples.len(), 11);
    assert_eq!(samples[0], Point3::new(0.0, 0.0, 0.0));
    assert_eq!(samples[10], Point3::new(4.0, 4.0, 0.0));

    let control = PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]]).unwrap();
    let spline = CatmullRomSplineList::new(&control, 0.5).unwrap();
    let samples = sample_curve_uniform(&spline, 4);
    for (s, p) in samples.iter().zip(control.iter()) {
        assert!(s.distance_to(*p) < 1e-12);
    }
}

#[test]
fn get_points_final_moves_forward_along_a_monotone_curve() {
    let curve = quarter_bezier();
    let sampled = curve.get_points_final(64);
    assert_eq!(sampled.dims(), 2);
    assert!(sampled.iter().all(|p| p.z == 0.0));
    assert!(
        sampled
            .points()
            .windows(2)
            .all(|w| w[1].x >= w[0].x && w[1].y >= w[0].y)
    );
}

#[test]
fn analytic_and_numeric_derivatives_agree() {
    let curve = quarter_bezier();
    let h = 1e-6;
    for t in [0.1, 0.35, 0.5, 0.8] {
        let ders = curve.derivatives_at(t, 2);
        let first = curve.point_at(t + h).sub_point(curve.point_at(t - h)) / (2.0 * h);
        assert!((ders[1] - first).length() < 1e-6, "t = {t}");

        let before = curve.derivatives_at(t - h, 1)[1];
        let after = curve.derivatives_at(t + h, 1)[1];
        let second = (after - before) / (2.0 * h);
        assert!((ders[2] - second).length() < 1e-5, "t = {t}");
    }
    // End tangents follow the first and last control legs.
    let start = curve.derivatives_at(0.0, 1)[1].normalized().unwrap();
    assert!((start.y - 1.0).abs() < 1e-9 && start.x.abs() < 1e-9);
    let end = curve.derivatives_at(1.0, 1)[1].normalized().unwrap();
    assert!((end.x - 1.0).abs() < 1e-9 && end.y.abs() < 1e-9);
}

#[test]
fn derivatives_beyond_degree_vanish() {
    let curve = quarter_bezier();
    let ders = curve.derivatives_at(0.4, 5);
    assert_eq!(ders.len(), 6);
    assert!(ders[3].length() > 0.0);
    assert_eq!(ders[4].length(), 0.0);
    assert_eq!(ders[5].length(), 0.0);
}

#[test]
fn malformed_curves_are_rejected() {
    let cps = vec![Point3::new(0.0, 0.0, 0.0); 4];
    assert!(matches!(
        BSplineCurve::new(3, cps.clone(), vec![0.0; 7], 3),
        Err(FitError::InvalidInput { .. })
    ));
    assert!(matches!(
        BSplineCurve::new(3, cps.clone(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], 4),
        Err(FitError::InvalidInput { .. })
    ));
    assert!(matches!(
        BSplineCurve::new(3, cps[..3].to_vec(), vec![0.0; 7], 3),
        Err(FitError::InsufficientData { provided: 3, required: 4 })
    ));
    assert!(matches!(
        BSplineCurve::new(3, cps, vec![0.0, 0.0, 0.0, 1.0, 0.5, 1.0, 1.0, 1.0], 3),
        Err(FitError::InvalidInput { .. })
    ));
}
