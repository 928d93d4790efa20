use poiframe_common::error::PoiframeError;
use poiframe_transform_core::builder::{build_axis_expr, Axis};
use proptest::prelude::*;

/// Strictly increasing `(time, value)` sequences of 2..12 points.
fn keyframe_points() -> impl Strategy<Value = Vec<(f64, f64)>> {
    (
        -100.0f64..100.0,
        prop::collection::vec((0.01f64..50.0, -5000.0f64..5000.0), 2..12),
    )
        .prop_map(|(start, steps)| {
            let mut t = start;
            steps
                .into_iter()
                .enumerate()
                .map(|(idx, (gap, value))| {
                    if idx > 0 {
                        t += gap;
                    }
                    (t, value)
                })
                .collect()
        })
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0)
}

proptest! {
    #[test]
    fn hits_every_keyframe_value_at_its_own_time(points in keyframe_points()) {
        for axis in [Axis::CenterX, Axis::CenterY, Axis::Zoom] {
            let expr = build_axis_expr(&points, axis).unwrap();
            for (t, v) in &points {
                let got = expr.eval(*t);
                prop_assert!(close(got, *v), "axis {:?} t={} expected {} got {}", axis, t, v, got);
            }
        }
    }

    #[test]
    fn interpolates_linearly_inside_segments(
        points in keyframe_points(),
        segment_seed in any::<prop::sample::Index>(),
        fraction in 0.001f64..0.999,
    ) {
        let i = segment_seed.index(points.len() - 1);
        let (t0, a) = points[i];
        let (t1, b) = points[i + 1];
        let t = t0 + (t1 - t0) * fraction;
        prop_assume!(t > t0 && t < t1);

        let expected = a + (b - a) * ((t - t0) / (t1 - t0));
        for axis in [Axis::CenterX, Axis::Zoom] {
            let expr = build_axis_expr(&points, axis).unwrap();
            prop_assert!(close(expr.eval(t), expected));
        }
    }

    #[test]
    fn centers_hold_and_zoom_relaxes_outside_span(
        points in keyframe_points(),
        margin in 0.001f64..1000.0,
    ) {
        let (first_t, first_v) = points[0];
        let (last_t, last_v) = points[points.len() - 1];

        let center = build_axis_expr(&points, Axis::CenterY).unwrap();
        let zoom = build_axis_expr(&points, Axis::Zoom).unwrap();

        prop_assert_eq!(center.eval(first_t - margin), first_v);
        prop_assert_eq!(center.eval(last_t + margin), last_v);
        prop_assert_eq!(zoom.eval(first_t - margin), 1.0);
        prop_assert_eq!(zoom.eval(last_t + margin), 1.0);
    }

    #[test]
    fn rejects_any_non_increasing_pair(
        points in keyframe_points(),
        pair_seed in any::<prop::sample::Index>(),
        back in 0.0f64..10.0,
    ) {
        let mut points = points;
        let i = pair_seed.index(points.len() - 1);
        points[i + 1].0 = points[i].0 - back;

        let result = build_axis_expr(&points, Axis::CenterX);
        prop_assert!(
            matches!(result, Err(PoiframeError::InvalidKeyframeSequence { .. })),
            "expected rejection, got {:?}",
            result
        );
    }

    #[test]
    fn rejects_fewer_than_two_points(time in -10.0f64..10.0, value in -10.0f64..10.0) {
        for axis in [Axis::CenterX, Axis::CenterY, Axis::Zoom] {
            prop_assert!(build_axis_expr(&[], axis).is_err());
            prop_assert!(build_axis_expr(&[(time, value)], axis).is_err());
        }
    }
}
