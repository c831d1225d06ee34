// tests/integration_tests.rs
//
// End-to-end tests through the public API: real JPEGs produced by the image
// crate, files on disk, batch runs and re-encoding.

use crunge::engine::codec::{JpegCodec, StillImageCodec};
use crunge::engine::io::Source;
use crunge::engine::tasks::output_name;
use crunge::engine::verify::{marker_layout, verify_structure};
use crunge::engine::{BatchMode, BatchTask, CorruptTask, CorruptionConfig};
use crunge::{corrupt, corrupt_with, inspect, parse_chain, ErrorCategory};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::path::PathBuf;
use tempfile::TempDir;

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn create_valid_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    create_test_image(width, height)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 80))
        .unwrap();
    buf
}

#[test]
fn real_jpeg_keeps_its_structure() {
    let original = create_valid_jpeg(64, 48);
    let summary = inspect(&original, &CorruptionConfig::default());
    assert_eq!(summary.scans, 1);
    assert!(summary.eligible > 0);

    let config = CorruptionConfig::default().with_seed(21);
    let chains = [
        "noise",
        "chunks, padding",
        "arcsin_weird 16, additive",
        "first_n_bytes 100 1.5",
    ];
    for chain in chains {
        let corrupted = corrupt_with(&original, &parse_chain(chain).unwrap(), &config).unwrap();
        assert_eq!(corrupted.len(), original.len(), "{chain}");
        assert_eq!(marker_layout(&corrupted).unwrap(), marker_layout(&original).unwrap());
    }
}

#[test]
fn header_tables_are_untouched() {
    let original = create_valid_jpeg(32, 32);
    let corrupted = corrupt(&original, &parse_chain("noise").unwrap()).unwrap();

    // Everything up to the end of the SOS header must match.
    let sos = original
        .windows(2)
        .position(|w| w == [0xFF, 0xDA])
        .expect("jpeg has a scan");
    let protected_end = sos + 2 + 18;
    assert_eq!(&corrupted[..protected_end], &original[..protected_end]);
    assert_eq!(&corrupted[corrupted.len() - 2..], &[0xFF, 0xD9]);
}

#[test]
fn reencoded_output_decodes() {
    let original = create_valid_jpeg(40, 24);
    let chain = parse_chain("first_n_bytes 1 2").unwrap();
    let (bytes, stats) = CorruptTask::new(Source::from_bytes(original), chain)
        .with_config(CorruptionConfig::default().with_seed(2))
        .with_verify(true)
        .with_reencode(75)
        .run()
        .unwrap();
    assert!(stats.eligible > 0);
    let decoded = JpegCodec.decode(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (40, 24));
}

#[test]
fn corrupt_task_writes_file_atomically() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("photo.jpg");
    std::fs::write(&input, create_valid_jpeg(16, 16)).unwrap();
    let output = dir.path().join("photo.noise.jpg");

    let stats = CorruptTask::new(Source::Path(input.clone()), parse_chain("noise").unwrap())
        .write_to(&output)
        .unwrap();

    let written = std::fs::read(&output).unwrap();
    assert_eq!(written.len() as u64, stats.bytes);
    verify_structure(&std::fs::read(&input).unwrap(), &written).unwrap();
}

#[test]
fn batch_chain_mode_names_outputs_by_chain() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..4)
        .map(|i| {
            let p = dir.path().join(format!("img{i}.jpg"));
            std::fs::write(&p, create_valid_jpeg(16 + i * 8, 16)).unwrap();
            p
        })
        .collect();
    let out_dir = dir.path().join("out");
    let chain = parse_chain("moving_average 4, jitter").unwrap();

    let results = BatchTask::new(inputs.clone(), &out_dir, chain.clone())
        .with_config(CorruptionConfig::default().with_seed(77))
        .run()
        .unwrap();

    assert_eq!(results.len(), 4);
    for (input, result) in inputs.iter().zip(&results) {
        assert!(result.success, "{:?}", result.error);
        let expected = out_dir.join(output_name(input, &chain).unwrap());
        assert!(expected.ends_with(format!(
            "{}.moving_average-jitter.jpg",
            input.file_stem().unwrap().to_string_lossy()
        )));
        assert!(expected.exists());
        let original = std::fs::read(input).unwrap();
        verify_structure(&original, &std::fs::read(&expected).unwrap()).unwrap();
    }
}

#[test]
fn batch_grouped_mode_splits_algorithms() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..5)
        .map(|i| {
            let p = dir.path().join(format!("f{i}.jpg"));
            std::fs::write(&p, create_valid_jpeg(16, 16)).unwrap();
            p
        })
        .collect();
    let out_dir = dir.path().join("grouped");

    let results = BatchTask::new(inputs, &out_dir, parse_chain("noise, additive").unwrap())
        .with_mode(BatchMode::Grouped)
        .run()
        .unwrap();

    let outputs: Vec<String> = results
        .iter()
        .map(|r| r.output_path.clone().unwrap_or_default())
        .collect();
    assert!(outputs[0].ends_with("f0.noise.jpg"));
    assert!(outputs[1].ends_with("f1.noise.jpg"));
    assert!(outputs[2].ends_with("f2.additive.jpg"));
    assert!(outputs[4].ends_with("f4.additive.jpg"));
}

#[test]
fn batch_survives_bad_inputs() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.jpg");
    std::fs::write(&good, create_valid_jpeg(16, 16)).unwrap();
    let not_jpeg = dir.path().join("notes.txt");
    std::fs::write(&not_jpeg, b"plain text, no markers").unwrap();
    let missing = dir.path().join("gone.jpg");

    let mut task = BatchTask::new(
        vec![good, not_jpeg, missing],
        dir.path().join("out"),
        parse_chain("noise").unwrap(),
    );
    task.verify = true;
    let results = task.run().unwrap();

    assert!(results[0].success);
    // no markers: verification cannot parse it
    assert!(!results[1].success);
    assert_eq!(results[1].error_category, Some(ErrorCategory::CodecError));
    assert!(!results[2].success);
    assert_eq!(results[2].error_code.as_deref(), Some("CRUNGE_IO_ERROR"));
}

#[test]
fn same_seed_same_file() {
    let original = create_valid_jpeg(24, 24);
    let chain = parse_chain("probabilistic, sinusoidal 3").unwrap();
    let config = CorruptionConfig::default().with_seed(5);
    assert_eq!(
        corrupt_with(&original, &chain, &config).unwrap(),
        corrupt_with(&original, &chain, &config).unwrap()
    );
}
