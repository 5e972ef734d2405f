use mcdenoise::{
    ChromaSubsampling, Denoiser, DenoiserConfig, FrameGeometry, Interlace, PipelinedDenoiser,
    SearchConfig, YuvFrame,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config(interlace: Interlace, parallel: bool) -> DenoiserConfig {
    DenoiserConfig {
        luma: SearchConfig {
            frames: 3,
            radius_x: 4,
            radius_y: 4,
            ..SearchConfig::default()
        },
        interlace,
        parallel,
        purge_interval: 2,
        ..DenoiserConfig::default()
    }
}

/// A drifting texture with light noise on every plane.
fn sequence(geometry: FrameGeometry, count: usize, seed: u64) -> Vec<YuvFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|t| {
            let mut frame = YuvFrame::new(geometry).unwrap();
            for (p, plane) in frame.planes_mut().enumerate() {
                let width = plane.width();
                for (i, v) in plane.as_mut_slice().iter_mut().enumerate() {
                    let (x, y) = (i % width, i / width);
                    let base = ((x + 2 * t) / 3 * 37 + y / 2 * 11 + p * 50) % 200;
                    *v = (base + rng.random_range(0..3usize)) as u8;
                }
            }
            frame
        })
        .collect()
}

fn collect_sync(denoiser: &mut Denoiser, frames: &[YuvFrame]) -> Vec<YuvFrame> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend(denoiser.denoise_frame(frame).unwrap());
    }
    while let Some(frame) = denoiser.flush().unwrap() {
        out.push(frame);
    }
    out
}

fn collect_piped(denoiser: &mut PipelinedDenoiser, frames: &[YuvFrame]) -> Vec<YuvFrame> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend(denoiser.denoise_frame(frame).unwrap());
    }
    while let Some(frame) = denoiser.flush().unwrap() {
        out.push(frame);
    }
    out
}

#[test]
fn chroma_worker_matches_synchronous_denoiser() {
    for subsampling in [
        ChromaSubsampling::Yuv420,
        ChromaSubsampling::Yuv422,
        ChromaSubsampling::Yuv444,
        ChromaSubsampling::Mono,
    ] {
        let geometry = FrameGeometry::new(24, 16, subsampling).unwrap();
        let frames = sequence(geometry, 7, 3);
        let cfg = config(Interlace::Progressive, false);
        let expected = collect_sync(&mut Denoiser::new(cfg.clone(), geometry).unwrap(), &frames);
        let actual = collect_piped(&mut PipelinedDenoiser::new(cfg, geometry).unwrap(), &frames);
        assert_eq!(expected.len(), frames.len());
        assert_eq!(actual, expected, "{subsampling:?}");
    }
}

#[test]
fn interlaced_streams_stay_in_step() {
    let geometry = FrameGeometry::new(24, 16, ChromaSubsampling::Yuv420).unwrap();
    let frames = sequence(geometry, 6, 8);
    for interlace in [Interlace::TopFieldFirst, Interlace::BottomFieldFirst] {
        let cfg = config(interlace, false);
        let expected = collect_sync(&mut Denoiser::new(cfg.clone(), geometry).unwrap(), &frames);
        let actual = collect_piped(&mut PipelinedDenoiser::new(cfg, geometry).unwrap(), &frames);
        assert_eq!(expected.len(), frames.len());
        assert_eq!(actual, expected, "{interlace:?}");
    }
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_planes_match_sequential() {
    let geometry = FrameGeometry::new(24, 16, ChromaSubsampling::Yuv420).unwrap();
    let frames = sequence(geometry, 7, 5);
    let sequential = collect_sync(
        &mut Denoiser::new(config(Interlace::Progressive, false), geometry).unwrap(),
        &frames,
    );
    let parallel = collect_sync(
        &mut Denoiser::new(config(Interlace::Progressive, true), geometry).unwrap(),
        &frames,
    );
    assert_eq!(parallel, sequential);
}
