use crate::geom::{
    CatmullRomSplineList, CentripetalCatmullRomSpline, Curve3, FitError, Point3, PointSet,
};

fn zigzag() -> PointSet {
    PointSet::from_xy(&[[0.0, 0.0], [1.0, 2.0], [2.0, 0.0], [3.0, 2.0]]).unwrap()
}

fn uneven_path() -> PointSet {
    PointSet::from_xyz(&[
        [0.0, 0.0, 0.0],
        [0.5, 0.1, 0.0],
        [4.0, 2.0, 1.0],
        [4.5, 6.0, 1.0],
        [9.0, 6.5, 0.0],
    ])
    .unwrap()
}

#[test]
fn one_sample_per_segment_returns_the_control_points() {
    let control = zigzag();
    let spline = CatmullRomSplineList::new(&control, 0.5).unwrap();
    let sampled = spline.get_points(1).unwrap();
    assert_eq!(sampled, control);

    let centripetal = CentripetalCatmullRomSpline::new(&control, 0.5).unwrap();
    assert_eq!(centripetal.get_points(1).unwrap(), control);
}

#[test]
fn sample_count_is_segments_times_samples_plus_one() {
    let control = uneven_path();
    let spline = CatmullRomSplineList::new(&control, 0.5).unwrap();
    let centripetal = CentripetalCatmullRomSpline::new(&control, 0.5).unwrap();
    assert_eq!(spline.segment_count(), 4);

    for s in [1, 2, 5, 20] {
        let a = spline.get_points(s).unwrap();
        let b = centripetal.get_points(s).unwrap();
        assert_eq!(a.len(), s * 4 + 1);
        assert_eq!(b.len(), s * 4 + 1);
        assert_eq!(a.dims(), 3);
        assert_eq!(b.dims(), 3);
    }
}

#[test]
fn sampled_curves_pass_through_every_control_point() {
    let control = uneven_path();
    let s = 7;
    for sampled in [
        CatmullRomSplineList::new(&control, 0.3)
            .unwrap()
            .get_points(s)
            .unwrap(),
        CentripetalCatmullRomSpline::new(&control, 0.5)
            .unwrap()
            .get_points(s)
            .unwrap(),
    ] {
        for (k, p) in control.iter().enumerate() {
            assert_eq!(sampled.get(k * s), Some(*p));
        }
    }
}

#[test]
fn evaluation_at_integer_parameters_hits_control_points() {
    let control = uneven_path();
    let spline = CatmullRomSplineList::new(&control, 0.5).unwrap();
    let centripetal = CentripetalCatmullRomSpline::new(&control, 0.5).unwrap();
    assert_eq!(spline.domain(), (0.0, 4.0));
    assert_eq!(centripetal.domain(), (0.0, 4.0));

    for (k, p) in control.iter().enumerate() {
        let t = k as f64;
        assert!(spline.point_at(t).distance_to(*p) < 1e-12);
        assert!(centripetal.point_at(t).distance_to(*p) < 1e-12);
    }
}

#[test]
fn three_control_points_are_rejected() {
    let control = PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]).unwrap();
    let expected = FitError::InsufficientControlPoints {
        provided: 3,
        required: 4,
    };
    assert_eq!(CatmullRomSplineList::new(&control, 0.5), Err(expected.clone()));
    assert_eq!(CentripetalCatmullRomSpline::new(&control, 0.5), Err(expected));
}

#[test]
fn zero_samples_per_segment_is_invalid() {
    let control = zigzag();
    assert!(matches!(
        CatmullRomSplineList::new(&control, 0.5).unwrap().get_points(0),
        Err(FitError::InvalidInput { .. })
    ));
    assert!(matches!(
        CentripetalCatmullRomSpline::new(&control, 0.5)
            .unwrap()
            .get_points(0),
        Err(FitError::InvalidInput { .. })
    ));
}

#[test]
fn non_finite_shape_parameters_are_invalid() {
    let control = zigzag();
    for bad in [f64::NAN, f64::INFINITY] {
        assert!(matches!(
            CatmullRomSplineList::new(&control, bad),
            Err(FitError::InvalidInput { .. })
        ));
        assert!(matches!(
            CentripetalCatmullRomSpline::new(&control, bad),
            Err(FitError::InvalidInput { .. })
        ));
    }
}

#[test]
fn out_of_range_shape_parameters_are_accepted() {
    let control = zigzag();
    let spline = CatmullRomSplineList::new(&control, 1.5).unwrap();
    assert_eq!(spline.tau(), 1.5);
    assert_eq!(spline.get_points(4).unwrap().len(), 13);

    let centripetal = CentripetalCatmullRomSpline::new(&control, -0.5).unwrap();
    assert_eq!(centripetal.alpha(), -0.5);
    assert_eq!(centripetal.get_points(4).unwrap().len(), 13);
}

#[test]
fn uniform_knot_spacing_matches_classic_tension() {
    let control = uneven_path();
    let classic = CatmullRomSplineList::new(&control, 0.5)
        .unwrap()
        .get_points(16)
        .unwrap();
    let uniform = CentripetalCatmullRomSpline::new(&control, 0.0)
        .unwrap()
        .get_points(16)
        .unwrap();
    for (a, b) in classic.iter().zip(uniform.iter()) {
        assert!(a.distance_to(*b) < 1e-12, "{a:?} vs {b:?}");
    }
}

#[test]
fn tension_changes_the_interior_but_not_the_control_points() {
    let control = zigzag();
    let loose = CatmullRomSplineList::new(&control, 0.5).unwrap();
    let tight = CatmullRomSplineList::new(&control, 0.1).unwrap();

    assert!(loose.point_at(1.5).distance_to(tight.point_at(1.5)) < 1e-12);
    assert!(loose.point_at(0.5).distance_to(tight.point_at(0.5)) > 1e-3);
    assert_eq!(loose.point_at(2.0), tight.point_at(2.0));
}

#[test]
fn coincident_consecutive_points_are_degenerate_for_centripetal() {
    let control =
        PointSet::from_xy(&[[0.0, 0.0], [1.0, 1.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]]).unwrap();
    for alpha in [0.0, 0.5, 1.0] {
        assert!(matches!(
            CentripetalCatmullRomSpline::new(&control, alpha),
            Err(FitError::DegenerateInput { .. })
        ));
    }
    assert!(CatmullRomSplineList::new(&control, 0.5).is_ok());
}

#[test]
fn centripetal_accepts_distinct_points_at_any_scale() {
    let rows: Vec<[f64; 2]> = zigzag().iter().map(|p| [p.x * 1e-13, p.y * 1e-13]).collect();
    let tiny = PointSet::from_xy(&rows).unwrap();
    let sampled = CentripetalCatmullRomSpline::new(&tiny, 0.5)
        .unwrap()
        .get_points(8)
        .unwrap();
    assert_eq!(sampled.len(), 25);
    assert!(sampled.iter().all(|p| p.is_finite()));
}

#[test]
fn centripetal_stays_finite_on_uneven_spacing() {
    let control = uneven_path();
    let sampled = CentripetalCatmullRomSpline::new(&control, 0.5)
        .unwrap()
        .get_points(32)
        .unwrap();
    assert!(sampled.iter().all(|p| p.is_finite()));
    let p = Point3::new(4.5, 6.0, 1.0);
    assert_eq!(sampled.get(3 * 32), Some(p));
}
