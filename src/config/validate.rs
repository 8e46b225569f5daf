// src/config/validate.rs

use crate::config::model::{BuildSection, EngineSection, JobFile, RawJobFile, TestSection};
use crate::engine::Job;
use crate::errors::{Result, TrygraphError};
use crate::tasks::{self, find_isolate, run_test};

impl TryFrom<RawJobFile> for JobFile {
    type Error = TrygraphError;

    fn try_from(raw: RawJobFile) -> std::result::Result<Self, Self::Error> {
        validate_raw(&raw)?;

        let build = find_isolate::TaskOptions {
            builder: raw.build.builder,
            target: raw.build.target,
            bucket: raw.build.bucket,
            change: raw.build.change,
        };
        let test = raw.test.map(|t| run_test::TaskOptions {
            build_options: build.clone(),
            swarming_server: t.swarming_server,
            dimensions: t.dimensions,
            extra_args: t.extra_args,
            attempts: t.attempts,
        });

        let file = JobFile {
            job: Job {
                id: raw.job.id,
                user: raw.job.user,
                url: raw.job.url,
                comparison_mode: raw.job.comparison_mode,
            },
            engine: raw.engine,
            build,
            test,
        };
        tasks::create_graph(&file).validate()?;
        Ok(file)
    }
}

fn validate_raw(raw: &RawJobFile) -> Result<()> {
    if raw.job.id.trim().is_empty() {
        return Err(config_error("[job].id must not be empty"));
    }
    validate_engine(&raw.engine)?;
    validate_build(&raw.build)?;
    if let Some(test) = &raw.test {
        validate_test(test)?;
    }
    Ok(())
}

fn validate_engine(engine: &EngineSection) -> Result<()> {
    if engine.call_timeout_secs == 0 {
        return Err(config_error("[engine].call_timeout_secs must be >= 1 (got 0)"));
    }
    if engine.commit_attempts == 0 {
        return Err(config_error("[engine].commit_attempts must be >= 1 (got 0)"));
    }
    if engine.max_passes == 0 {
        return Err(config_error("[engine].max_passes must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_build(build: &BuildSection) -> Result<()> {
    for (field, value) in [
        ("builder", &build.builder),
        ("target", &build.target),
        ("bucket", &build.bucket),
    ] {
        if value.trim().is_empty() {
            return Err(config_error(format!("[build].{field} must not be empty")));
        }
    }

    if build.change.commits.is_empty() {
        return Err(config_error(
            "[build].change must contain at least one [[build.change.commits]] entry",
        ));
    }
    for (i, commit) in build.change.commits.iter().enumerate() {
        if commit.repository.trim().is_empty() || commit.git_hash.trim().is_empty() {
            return Err(config_error(format!(
                "[build].change.commits[{i}] needs both repository and git_hash"
            )));
        }
    }
    Ok(())
}

fn validate_test(test: &TestSection) -> Result<()> {
    if test.swarming_server.trim().is_empty() {
        return Err(config_error("[test].swarming_server must not be empty"));
    }
    if test.attempts == 0 {
        return Err(config_error("[test].attempts must be >= 1 (got 0)"));
    }
    Ok(())
}

fn config_error(message: impl Into<String>) -> TrygraphError {
    TrygraphError::ConfigError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[job]
id = "job-1"

[build]
builder = "Mac Builder"
target = "telemetry_perf_tests"
bucket = "luci.bucket"

[[build.change.commits]]
repository = "chromium"
git_hash = "7c7e90be"
"#;

    fn parse(toml_text: &str) -> Result<JobFile> {
        let raw: RawJobFile = toml::from_str(toml_text)?;
        JobFile::try_from(raw)
    }

    #[test]
    fn minimal_file_uses_engine_defaults() {
        let file = parse(MINIMAL).unwrap();
        assert_eq!(file.engine, EngineSection::default());
        assert_eq!(file.engine.max_passes, 8);
        assert!(file.test.is_none());
        assert_eq!(file.build.change.id(), "chromium@7c7e90be");
    }

    #[test]
    fn test_section_reuses_build_options() {
        let text = format!(
            "{MINIMAL}\n[test]\nswarming_server = \"https://swarming.example\"\nattempts = 3\n"
        );
        let file = parse(&text).unwrap();
        let test = file.test.unwrap();
        assert_eq!(test.attempts, 3);
        assert_eq!(test.build_options, file.build);
    }

    #[test]
    fn rejects_zero_attempts_and_passes() {
        let text = format!("{MINIMAL}\n[test]\nswarming_server = \"s\"\nattempts = 0\n");
        let err = parse(&text).unwrap_err();
        assert!(err.to_string().contains("[test].attempts"));

        let text = MINIMAL.replace("[build]", "[engine]\nmax_passes = 0\n\n[build]");
        let err = parse(&text).unwrap_err();
        assert!(err.to_string().contains("[engine].max_passes"));
    }

    #[test]
    fn rejects_missing_commits_and_empty_fields() {
        let no_commits = MINIMAL
            .replace("[[build.change.commits]]", "")
            .replace("repository = \"chromium\"", "")
            .replace("git_hash = \"7c7e90be\"", "");
        let err = parse(&no_commits).unwrap_err();
        assert!(matches!(err, TrygraphError::ConfigError(_)));

        let err = parse(&MINIMAL.replace("\"Mac Builder\"", "\"\"")).unwrap_err();
        assert!(err.to_string().contains("[build].builder"));
    }
}
