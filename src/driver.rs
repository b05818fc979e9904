//! Runs the engine over directories of compiled classes
//!
//! A run has two phases. Every `.class` file is first read and classified, with the
//! run's directories (plus [`Config::classpath`]) serving as the class path for
//! superclass lookups. Only then are the applicable classes rewritten and written back
//! in place, so classification never observes a half-rewritten tree. Both phases fan
//! out over a rayon pool.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::classfile::verify::verify;
use crate::classfile::ClassFile;
use crate::classpath::ClassPath;
use crate::config::Config;
use crate::engine::{Applicability, Classifier, RewriteReport, Rewriter};
use crate::error::{Error, Result};
use crate::policy::{PolicyRegistry, TimeoutSpec};

/// What the driver did with one class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Rewritten and written back
    Transformed { field_name: String, instrumented: usize, skipped: usize },
    /// Applicable, but the run was a dry run
    WouldTransform,
    /// Not applicable; left as is
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub class_name: String,
    pub applicability: Applicability,
    pub action: Action,
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of a [`Driver::run`], in path order
#[derive(Debug)]
pub struct RunReport {
    pub policy: TimeoutSpec,
    pub outcomes: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn transformed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| matches!(o.action, Action::Transformed { .. }))
    }

    pub fn count(&self, applicability: Applicability) -> usize {
        self.outcomes.iter().filter(|o| o.applicability == applicability).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Classified {
    path: PathBuf,
    class_name: String,
    applicability: Applicability,
    class: ClassFile,
}

pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All `.class` files under `dir`, sorted
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                let source = e.into_io_error().unwrap_or_else(|| std::io::Error::other("file system loop"));
                Error::io(path, source)
            })?;
            if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "class") {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Enforce `policy` on every class under `dirs`
    pub fn run(&self, policy: &TimeoutSpec, dirs: &[PathBuf]) -> Result<RunReport> {
        let rewriter = Rewriter::new(policy.timeout_millis())?;
        let mut files = Vec::new();
        for dir in dirs {
            files.extend(Self::discover(dir)?);
        }
        log::info!("Enforcing {} on {} class files", policy, files.len());

        let classpath = ClassPath::new(dirs.iter().chain(&self.config.classpath).cloned());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| Error::config(format!("cannot start worker threads: {}", e)))?;

        let classified: Vec<(PathBuf, Result<Classified>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|path| {
                    let result = classify_file(&path, &classpath);
                    (path, result)
                })
                .collect()
        });

        let mut report = RunReport { policy: policy.clone(), outcomes: Vec::new(), failures: Vec::new() };
        let mut candidates = Vec::new();
        for (path, result) in classified {
            match result {
                Ok(c) if c.applicability.should_transform() && !self.config.dry_run => candidates.push(c),
                Ok(c) => {
                    let action =
                        if c.applicability.should_transform() { Action::WouldTransform } else { Action::Unchanged };
                    report.outcomes.push(FileOutcome {
                        path: c.path,
                        class_name: c.class_name,
                        applicability: c.applicability,
                        action,
                    });
                }
                Err(error) => self.fail(&mut report, path, error)?,
            }
        }

        let rewritten: Vec<(FileOutcome, Result<RewriteReport>)> = pool.install(|| {
            candidates
                .into_par_iter()
                .map(|c| {
                    let outcome = FileOutcome {
                        path: c.path.clone(),
                        class_name: c.class_name.clone(),
                        applicability: c.applicability,
                        action: Action::Unchanged,
                    };
                    (outcome, transform_file(c, &rewriter))
                })
                .collect()
        });
        for (mut outcome, result) in rewritten {
            match result {
                Ok(rewrite) => {
                    outcome.action = Action::Transformed {
                        field_name: rewrite.field_name,
                        instrumented: rewrite.instrumented.len(),
                        skipped: rewrite.skipped.len(),
                    };
                    report.outcomes.push(outcome);
                }
                Err(error) => self.fail(&mut report, outcome.path, error)?,
            }
        }

        report.outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        log::info!(
            "{} of {} classes transformed, {} failed",
            report.transformed().count(),
            report.outcomes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Enforce each policy of `registry` on its assigned directories, in name order.
    /// A policy without directories is skipped.
    pub fn run_registry(&self, registry: &PolicyRegistry) -> Result<Vec<RunReport>> {
        let mut reports = Vec::with_capacity(registry.len());
        for policy in registry.iter() {
            let dirs = registry.targets(&policy.name);
            if dirs.is_empty() {
                log::warn!("No class directories assigned to policy {}", policy);
                continue;
            }
            reports.push(self.run(policy, dirs)?);
        }
        Ok(reports)
    }

    fn fail(&self, report: &mut RunReport, path: PathBuf, error: Error) -> Result<()> {
        if self.config.fail_fast {
            return Err(error);
        }
        log::error!("{}: {}", path.display(), error);
        report.failures.push(FileFailure { path, error });
        Ok(())
    }
}

fn classify_file(path: &Path, classpath: &ClassPath) -> Result<Classified> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let class = ClassFile::parse(&bytes).map_err(|e| Error::malformed(path.display().to_string(), e))?;
    let class_name = class.name().map_err(|e| Error::malformed(path.display().to_string(), e))?.to_string();
    let applicability = Classifier::with_hierarchy(classpath).classify(&class);
    log::debug!("{}: {}", class_name, applicability);
    Ok(Classified { path: path.to_path_buf(), class_name, applicability, class })
}

fn transform_file(classified: Classified, rewriter: &Rewriter) -> Result<RewriteReport> {
    let Classified { path, class_name, mut class, .. } = classified;
    let report = rewriter.rewrite(&mut class)?;
    verify(&class).map_err(|source| Error::Verify { class: class_name.clone(), source })?;
    fs::write(&path, class.to_bytes()).map_err(|e| Error::io(&path, e))?;
    log::debug!("{}: added {} to {} constructors", class_name, report.field_name, report.instrumented.len());
    Ok(report)
}
