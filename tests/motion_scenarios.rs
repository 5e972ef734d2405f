use mcdenoise::{
    DenoiseError, MotionSearcher, Pixel, PixelCbCr, PixelY, SearchConfig, SearcherState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WIDTH: usize = 32;
const HEIGHT: usize = 16;

fn config(frames: usize) -> SearchConfig {
    SearchConfig {
        frames,
        radius_x: 4,
        radius_y: 4,
        ..SearchConfig::default()
    }
}

/// Feeds every frame, taking ready output before each add, then drains.
fn run<P: Pixel>(searcher: &mut MotionSearcher<P>, frames: &[Vec<P>]) -> Vec<Vec<P>> {
    let mut out = Vec::new();
    for frame in frames {
        if let Some(view) = searcher.frame_ready_for_output() {
            out.push(view.to_vec().unwrap());
        }
        let stats = searcher.add_frame(frame).unwrap();
        assert_eq!(stats.total(), (searcher.width() * searcher.height()) as u64);
    }
    while let Some(view) = searcher.get_remaining_frames() {
        out.push(view.to_vec().unwrap());
    }
    out
}

/// Pans a random texture by `(dx, dy)` per frame. Samples are multiples of
/// eight, so no two distinct values are within the default tolerances.
fn panning_luma(seed: u64, count: usize, dx: usize, dy: usize) -> Vec<Vec<PixelY>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base_w = WIDTH + dx * count;
    let base_h = HEIGHT + dy * count;
    // Large flat blocks give the motion search something to lock onto.
    let blocks: Vec<u8> = (0..(base_w / 4 + 1) * (base_h / 2 + 1))
        .map(|_| rng.random_range(0..32u8) * 8)
        .collect();
    let sample = |x: usize, y: usize| blocks[(y / 2) * (base_w / 4 + 1) + x / 4];
    (0..count)
        .map(|t| {
            let (ox, oy) = (dx * (count - 1 - t), dy * (count - 1 - t));
            let mut frame = Vec::with_capacity(WIDTH * HEIGHT);
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    frame.push(PixelY(sample(x + ox, y + oy)));
                }
            }
            frame
        })
        .collect()
}

#[test]
fn constant_frames_come_back_unchanged() {
    let frames = vec![vec![PixelY(77); WIDTH * HEIGHT]; 6];
    let mut searcher = MotionSearcher::<PixelY>::new(config(4), WIDTH, HEIGHT).unwrap();
    let out = run(&mut searcher, &frames);
    assert_eq!(out, frames);
}

#[test]
fn separated_values_are_reconstructed_exactly() {
    for (seed, (dx, dy)) in [(1, (2, 0)), (2, (0, 1)), (3, (1, 1)), (4, (3, 2))] {
        let frames = panning_luma(seed, 8, dx, dy);
        let mut searcher = MotionSearcher::<PixelY>::new(config(3), WIDTH, HEIGHT).unwrap();
        assert_eq!(run(&mut searcher, &frames), frames, "pan ({dx}, {dy})");

        let expanding = SearchConfig {
            expand_existing_regions: true,
            ..config(3)
        };
        let mut searcher = MotionSearcher::<PixelY>::new(expanding, WIDTH, HEIGHT).unwrap();
        assert_eq!(run(&mut searcher, &frames), frames, "expanding pan ({dx}, {dy})");
    }
}

#[test]
fn shifted_frame_is_reconstructed() {
    let size: usize = 16;
    let mut rng = StdRng::seed_from_u64(17);
    let first: Vec<PixelY> = (0..size * size)
        .map(|_| PixelY(rng.random_range(0..32u8) * 8))
        .collect();
    // Shift right by two, repeating the left border column.
    let second: Vec<PixelY> = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            first[y * size + x.saturating_sub(2)]
        })
        .collect();
    let mut searcher = MotionSearcher::<PixelY>::new(config(2), size, size).unwrap();
    let out = run(&mut searcher, &[first.clone(), second.clone()]);
    assert_eq!(out, vec![first, second]);
}

#[test]
fn chroma_pairs_are_reconstructed_exactly() {
    let luma = panning_luma(9, 6, 2, 1);
    let frames: Vec<Vec<PixelCbCr>> = luma
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|p| PixelCbCr::new(p.0, 248 - p.0))
                .collect()
        })
        .collect();
    let mut searcher = MotionSearcher::<PixelCbCr>::new(config(3), WIDTH, HEIGHT).unwrap();
    assert_eq!(run(&mut searcher, &frames), frames);
}

#[test]
fn noise_is_averaged_away() {
    let mut rng = StdRng::seed_from_u64(11);
    let frames: Vec<Vec<PixelY>> = (0..12)
        .map(|_| {
            (0..WIDTH * HEIGHT)
                .map(|_| PixelY(rng.random_range(99..=101)))
                .collect()
        })
        .collect();
    let mut searcher = MotionSearcher::<PixelY>::new(config(6), WIDTH, HEIGHT).unwrap();
    let out = run(&mut searcher, &frames);
    assert_eq!(out.len(), frames.len());

    let error = |frame: &Vec<PixelY>| -> u32 {
        frame.iter().map(|p| p.0.abs_diff(100) as u32).sum()
    };
    let input_error: u32 = frames.iter().take(6).map(error).sum();
    let output_error: u32 = out.iter().take(6).map(error).sum();
    assert!(
        output_error * 2 < input_error,
        "output error {output_error} vs input error {input_error}"
    );
}

#[test]
fn a_lone_outlier_stays_and_spares_its_neighbors() {
    let mut frames = vec![vec![PixelY(100); WIDTH * HEIGHT]; 5];
    frames[2][5 * WIDTH + 5] = PixelY(200);
    let mut searcher = MotionSearcher::<PixelY>::new(config(3), WIDTH, HEIGHT).unwrap();
    let out = run(&mut searcher, &frames);
    assert_eq!(out[2][5 * WIDTH + 5], PixelY(200));
    for (x, y) in [
        (4, 4),
        (5, 4),
        (6, 4),
        (4, 5),
        (6, 5),
        (4, 6),
        (5, 6),
        (6, 6),
    ] {
        assert_eq!(out[2][y * WIDTH + x], PixelY(100));
    }
    assert!(out[3].iter().all(|&p| p == PixelY(100)));
}

#[test]
fn every_added_frame_is_output_once() {
    for count in [1, 2, 3, 7] {
        let frames = panning_luma(5, count, 1, 0);
        let mut searcher = MotionSearcher::<PixelY>::new(config(3), WIDTH, HEIGHT).unwrap();
        assert_eq!(run(&mut searcher, &frames).len(), count);
        assert_eq!(searcher.state(), SearcherState::Draining);
        assert_eq!(searcher.buffered_frames(), 0);
    }
}

#[test]
fn purging_does_not_change_results() {
    let frames = panning_luma(21, 9, 2, 1);
    let mut plain = MotionSearcher::<PixelY>::new(config(4), WIDTH, HEIGHT).unwrap();
    let expected = run(&mut plain, &frames);

    let mut purged = MotionSearcher::<PixelY>::new(config(4), WIDTH, HEIGHT).unwrap();
    let mut out = Vec::new();
    for frame in &frames {
        if let Some(view) = purged.frame_ready_for_output() {
            out.push(view.to_vec().unwrap());
        }
        purged.add_frame(frame).unwrap();
        purged.purge();
    }
    while let Some(view) = purged.get_remaining_frames() {
        out.push(view.to_vec().unwrap());
    }
    assert_eq!(out, expected);
}

#[test]
fn match_throttles_apply_regions_early_without_losing_exactness() {
    // (count, size, expect early applications)
    for (count, size, early) in [(1, 1, true), (16, 1, false), (1, 50, true)] {
        let throttled = SearchConfig {
            match_count_throttle: count,
            match_size_throttle: size,
            ..config(3)
        };
        let mut moved_flooded = 0;
        for (seed, (dx, dy)) in [(21, (2, 0)), (22, (1, 1)), (23, (3, 2))] {
            let frames = panning_luma(seed, 6, dx, dy);
            let mut searcher =
                MotionSearcher::<PixelY>::new(throttled.clone(), WIDTH, HEIGHT).unwrap();
            let mut out = Vec::new();
            for frame in &frames {
                if let Some(view) = searcher.frame_ready_for_output() {
                    out.push(view.to_vec().unwrap());
                }
                moved_flooded += searcher.add_frame(frame).unwrap().moved_flooded;
            }
            while let Some(view) = searcher.get_remaining_frames() {
                out.push(view.to_vec().unwrap());
            }
            assert_eq!(out, frames, "throttles ({count}, {size}) pan ({dx}, {dy})");
        }
        if early {
            assert!(moved_flooded > 0, "throttles ({count}, {size}) never fired");
        }
    }
}

#[test]
fn disabled_motion_search_only_links_unmoved_pixels() {
    let frames = panning_luma(13, 4, 2, 0);
    let disabled = SearchConfig {
        match_count_throttle: 0,
        ..config(3)
    };
    let mut searcher = MotionSearcher::<PixelY>::new(disabled, WIDTH, HEIGHT).unwrap();
    searcher.add_frame(&frames[0]).unwrap();
    let stats = searcher.add_frame(&frames[1]).unwrap();
    assert_eq!(stats.moved + stats.moved_flooded, 0);
    assert_eq!(stats.total(), (WIDTH * HEIGHT) as u64);
}

#[test]
fn invalid_configurations_are_rejected() {
    let too_few = SearchConfig {
        frames: 1,
        ..config(3)
    };
    assert!(matches!(
        MotionSearcher::<PixelY>::new(too_few, WIDTH, HEIGHT),
        Err(DenoiseError::InvalidInput(_))
    ));
    let wide_radius = SearchConfig {
        radius_x: WIDTH + 1,
        ..config(3)
    };
    assert!(matches!(
        MotionSearcher::<PixelY>::new(wide_radius, WIDTH, HEIGHT),
        Err(DenoiseError::InvalidRadius { .. })
    ));
    assert!(matches!(
        MotionSearcher::<PixelY>::new(config(3), 3, 1),
        Err(DenoiseError::InvalidDimensions { .. })
    ));
}

#[test]
fn adding_after_drain_is_an_error() {
    let mut searcher = MotionSearcher::<PixelY>::new(config(3), WIDTH, HEIGHT).unwrap();
    searcher.add_frame(&vec![PixelY(1); WIDTH * HEIGHT]).unwrap();
    assert!(searcher.get_remaining_frames().is_some());
    assert!(matches!(
        searcher.add_frame(&vec![PixelY(1); WIDTH * HEIGHT]),
        Err(DenoiseError::InvalidInput(_))
    ));
}
