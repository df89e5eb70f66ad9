//! End-to-end tests for the conversion pipeline and model export

use async_trait::async_trait;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use splat_forge::{
    decode, Converter, Error, JobStatus, Result, SplatForgeConfig, SplatService,
};

fn test_config(root: &Path) -> SplatForgeConfig {
    let mut config = SplatForgeConfig::default();
    config.storage.input_folder = root.join("inputs");
    config.storage.output_folder = root.join("outputs");
    config
}

/// Writes the model after a short delay; fails images named `bad*`
struct SlowConverter;

#[async_trait]
impl Converter for SlowConverter {
    async fn convert(&self, input_path: &Path, output_folder: &Path) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stem = input_path.file_stem().unwrap().to_string_lossy().into_owned();
        if stem.starts_with("bad") {
            return Err(Error::external_tool("exit status: 1", "model error"));
        }
        std::fs::write(output_folder.join(format!("{}.ply", stem)), b"ply\n")?;
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

async fn wait_until_idle(service: &SplatService) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while service.list_jobs().has_active {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("jobs should finish");
}

fn is_legal_prefix(seen: &[JobStatus]) -> bool {
    const DONE: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed];
    const FAILED: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Processing, JobStatus::Failed];
    seen.len() <= 3 && (DONE.starts_with(seen) || FAILED.starts_with(seen))
}

#[tokio::test]
async fn submissions_start_pending_with_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        SplatService::start_with_converter(test_config(dir.path()), Arc::new(SlowConverter)).unwrap();

    // No await between submissions, so the worker task has not run yet
    let ids: Vec<Uuid> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|name| service.submit(*name, dir.path().join("inputs").join(name)))
        .collect();

    let listing = service.list_jobs();
    assert_eq!(listing.jobs.len(), 3);
    assert!(listing.has_active);
    for id in &ids {
        assert_eq!(service.job(*id).unwrap().status, JobStatus::Pending);
    }
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_ne!(ids[0], ids[2]);

    wait_until_idle(&service).await;
}

#[tokio::test]
async fn lifecycle_is_monotonic_and_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        SplatService::start_with_converter(test_config(dir.path()), Arc::new(SlowConverter)).unwrap();

    let names = ["one.png", "bad.png", "two.jpg", "three.webp"];
    for name in names {
        service.submit(name, dir.path().join("inputs").join(name));
    }

    let mut seen: HashMap<Uuid, Vec<JobStatus>> = HashMap::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let listing = service.list_jobs();
            let processing = listing
                .jobs
                .iter()
                .filter(|job| job.status == JobStatus::Processing)
                .count();
            assert!(processing <= 1, "{} jobs processing at once", processing);

            for job in &listing.jobs {
                let history = seen.entry(job.id).or_default();
                if history.last() != Some(&job.status) {
                    history.push(job.status);
                }
            }
            if !listing.has_active {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("jobs should finish");

    assert_eq!(seen.len(), names.len());
    for history in seen.values() {
        assert!(is_legal_prefix(history), "illegal status sequence {:?}", history);
        assert!(history.last().unwrap().is_terminal());
    }

    let jobs = service.list_jobs().jobs;
    let bad = jobs.iter().find(|job| job.filename == "bad.png").unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert_eq!(bad.error.as_deref(), Some("model error"));
    assert_eq!(
        jobs.iter().filter(|job| job.status == JobStatus::Completed).count(),
        3
    );
}

#[cfg(unix)]
mod subprocess {
    use super::*;

    fn shell_config(root: &Path, script: &str) -> SplatForgeConfig {
        let mut config = test_config(root);
        config.converter.program = "sh".to_string();
        config.converter.args = vec!["-c".to_string(), script.to_string()];
        config
    }

    #[tokio::test]
    async fn tool_stderr_becomes_job_error() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            SplatService::start(shell_config(dir.path(), "printf 'model error' >&2; exit 1")).unwrap();

        let id = service.submit("cat.png", dir.path().join("inputs/cat.png"));
        wait_until_idle(&service).await;

        let job = service.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("model error"));
    }

    #[tokio::test]
    async fn tool_writing_model_completes() {
        let dir = tempfile::tempdir().unwrap();
        // $1 is the input image, $3 the output folder
        let script = r#"base=$(basename "$1"); touch "$3/${base%.*}.ply""#;
        let service = SplatService::start(shell_config(dir.path(), script)).unwrap();

        let id = service.submit("cat.png", dir.path().join("inputs/cat.png"));
        wait_until_idle(&service).await;

        assert_eq!(service.job(id).unwrap().status, JobStatus::Completed);
        assert!(dir.path().join("outputs/cat.ply").is_file());
    }

    #[tokio::test]
    async fn clean_exit_without_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = SplatService::start(shell_config(dir.path(), "exit 0")).unwrap();

        let id = service.submit("cat.png", dir.path().join("inputs/cat.png"));
        wait_until_idle(&service).await;

        let job = service.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("output artifact not found after execution")
        );
    }

    #[tokio::test]
    async fn missing_tool_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.converter.program = "splat-forge-missing-tool".to_string();
        let service = SplatService::start(config).unwrap();

        let id = service.submit("cat.png", dir.path().join("inputs/cat.png"));
        wait_until_idle(&service).await;

        let job = service.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("splat-forge-missing-tool"));
    }
}

fn write_splat_ply(path: &Path, xs: &[f32]) {
    let mut data = format!(
        "ply\nformat binary_little_endian 1.0\nelement vertex {}\n",
        xs.len()
    )
    .into_bytes();
    for name in [
        "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
        "rot_0", "rot_1", "rot_2", "rot_3",
    ] {
        data.extend_from_slice(format!("property float {}\n", name).as_bytes());
    }
    data.extend_from_slice(b"end_header\n");

    for (i, x) in xs.iter().enumerate() {
        let log_scale = -(i as f32);
        for v in [
            *x, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, log_scale, log_scale, log_scale, 1.0, 0.0, 0.0, 0.0,
        ] {
            data.write_f32::<LittleEndian>(v).unwrap();
        }
    }
    std::fs::write(path, data).unwrap();
}

#[tokio::test]
async fn export_model_encodes_output_ply() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        SplatService::start_with_converter(test_config(dir.path()), Arc::new(SlowConverter)).unwrap();

    // Later rows have smaller scales, so they come out last
    write_splat_ply(&dir.path().join("outputs/kitten.ply"), &[5.0, 6.0, 7.0]);

    let splat = service.export_model("kitten").await.unwrap();
    assert_eq!(splat.len(), 3 * 32);

    let xs: Vec<f32> = decode(&splat).unwrap().iter().map(|r| r.position[0]).collect();
    assert_eq!(xs, vec![5.0, 6.0, 7.0]);

    // Recomputed each time, byte for byte
    assert_eq!(service.export_model("kitten").await.unwrap(), splat);
}

#[tokio::test]
async fn export_rejects_unknown_or_escaping_ids() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        SplatService::start_with_converter(test_config(dir.path()), Arc::new(SlowConverter)).unwrap();
    write_splat_ply(&dir.path().join("inputs/secret.ply"), &[1.0]);

    for id in ["missing", "../inputs/secret", "", ".."] {
        let err = service.export_model(id).await.unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)), "accepted {:?}", id);
    }
}

#[tokio::test]
async fn converted_models_appear_in_gallery_and_can_be_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        SplatService::start_with_converter(test_config(dir.path()), Arc::new(SlowConverter)).unwrap();

    let image = dir.path().join("inputs/fox.png");
    std::fs::write(&image, b"png").unwrap();
    let id = service.submit("fox.png", &image);
    wait_until_idle(&service).await;
    assert_eq!(service.job(id).unwrap().status, JobStatus::Completed);

    let models = service.list_models().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, "fox");
    assert_eq!(models[0].image_path.as_deref(), Some(image.as_path()));

    assert!(matches!(
        service.delete_model("../inputs/fox"),
        Err(Error::ModelNotFound(_))
    ));
    assert_eq!(service.delete_model("fox").unwrap().len(), 2);
    assert!(service.list_models().unwrap().is_empty());
    assert!(!image.exists());
}
