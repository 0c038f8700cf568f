use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;

use fiducial_pose::camera::{
    CameraCalibration, CameraInput, CameraSource, ImageSequenceCamera, load_calibration,
};
use fiducial_pose::marker::YamlMarkerFile;
use fiducial_pose::{PipelineComponents, PipelineConfig, PipelineController, RenderTarget, SinkStatus};

const USAGE: &str = "usage: fiducial-pose <marker.yml> <calibration.yml> <image-dir|video-file|camera-id> [config.yml]";

/// Poll interval of the pose consumer loop.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A bare number selects a capture device, anything else is a path.
fn parse_input(arg: &str) -> CameraInput {
    match arg.parse::<u32>() {
        Ok(id) => CameraInput::Device(id),
        Err(_) => CameraInput::Path(PathBuf::from(arg)),
    }
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
        .unwrap_or(false)
}

fn open_camera(calibration: CameraCalibration, input: &CameraInput) -> Result<Box<dyn CameraSource>> {
    match input {
        CameraInput::Path(path) if path.is_dir() || is_still_image(path) => {
            Ok(Box::new(ImageSequenceCamera::new(calibration)))
        }
        _ => video_camera(calibration, input),
    }
}

#[cfg(feature = "opencv")]
fn video_camera(calibration: CameraCalibration, input: &CameraInput) -> Result<Box<dyn CameraSource>> {
    use fiducial_pose::camera::VideoCaptureCamera;
    Ok(Box::new(VideoCaptureCamera::new(calibration, input.clone())))
}

#[cfg(not(feature = "opencv"))]
fn video_camera(_calibration: CameraCalibration, input: &CameraInput) -> Result<Box<dyn CameraSource>> {
    bail!("{input:?} needs video capture; rebuild with --features opencv")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let marker_path = PathBuf::from(&args[0]);
    let calibration_path = PathBuf::from(&args[1]);
    let input = parse_input(&args[2]);
    let config = match args.get(3) {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    let calibration = load_calibration(&calibration_path)?;
    let camera = open_camera(calibration, &input)?;
    let components = PipelineComponents::reference(
        camera,
        Box::new(YamlMarkerFile::new(&marker_path)),
        &config,
    );

    let mut pipeline = PipelineController::new();
    pipeline.init(components)?;
    let params = pipeline.camera_parameters();
    println!(
        "Camera {}x{} (fx {:.1}, fy {:.1})",
        params.width, params.height, params.focal_x, params.focal_y
    );

    let started = Instant::now();
    pipeline.start_with_input(RenderTarget::default(), &input)?;

    loop {
        let finished = pipeline.is_worker_finished();
        let (status, pose) = pipeline.update();
        if status == SinkStatus::Fresh {
            let t = pose.translation;
            let frame = pipeline.sink().latest_frame().map(|f| f.index).unwrap_or_default();
            println!(
                "frame {:>5}: t = [{:+.4}, {:+.4}, {:+.4}] q = [{:+.4}, {:+.4}, {:+.4}, {:+.4}]",
                frame,
                t.x,
                t.y,
                t.z,
                pose.rotation.w,
                pose.rotation.i,
                pose.rotation.j,
                pose.rotation.k
            );
        }
        if finished {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    pipeline.stop()?;
    let elapsed = started.elapsed();
    let stats = pipeline.stats();
    println!(
        "Processed {} frames in {:.2}s ({:.1} frames/s), {} poses",
        stats.frames_acquired,
        elapsed.as_secs_f64(),
        stats.fps(elapsed),
        stats.poses_published
    );

    Ok(())
}
