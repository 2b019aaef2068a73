//! Output layout writer (§6): `outputs/{category}/{product_id}/runs/{run_id}/`
//! plus a `latest/` pointer mirroring the most recent successful run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use harvester_events::EventStore;
use harvester_orchestrator::RunSummary;

pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(output_root: &Path, category: &str, product_id: &str, run_id: &str) -> Result<Self> {
        let root = output_root.join(category).join(product_id).join("runs").join(run_id);
        for sub in ["raw/pages", "raw/network", "raw/pdfs", "normalized", "provenance", "analysis", "logs"] {
            fs::create_dir_all(root.join(sub)).with_context(|| format!("creating {sub}"))?;
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn write_needset(&self, needset_json: &serde_json::Value) -> Result<()> {
        fs::write(
            self.root.join("analysis/needset.json"),
            serde_json::to_string_pretty(needset_json)?,
        )?;
        Ok(())
    }

    /// Writes `normalized/{category}.normalized.json`, `.row.tsv`, and the
    /// two `provenance/` artifacts (§6) from a [`crate::live_ports::FieldExport`].
    pub fn write_field_export(&self, category: &str, export: &crate::live_ports::FieldExport) -> Result<()> {
        fs::write(
            self.root.join(format!("normalized/{category}.normalized.json")),
            serde_json::to_string_pretty(&export.normalized)?,
        )?;

        if let serde_json::Value::Object(fields) = &export.normalized {
            let mut header = String::new();
            let mut row = String::new();
            for (i, (key, value)) in fields.iter().enumerate() {
                if i > 0 {
                    header.push('\t');
                    row.push('\t');
                }
                header.push_str(key);
                row.push_str(&value.as_str().unwrap_or_default().replace('\t', " "));
            }
            fs::write(self.root.join(format!("normalized/{category}.row.tsv")), format!("{header}\n{row}\n"))?;
        }

        fs::write(
            self.root.join("provenance/fields.provenance.json"),
            serde_json::to_string_pretty(&export.provenance)?,
        )?;
        fs::write(
            self.root.join("provenance/fields.candidates.json"),
            serde_json::to_string_pretty(&export.candidates)?,
        )?;
        Ok(())
    }

    pub async fn write_event_log(&self, events: &EventStore, run_id: &str) -> Result<()> {
        let stored = events.read_by_run(run_id).await?;
        let mut lines = String::new();
        for event in &stored {
            lines.push_str(&serde_json::to_string(&event.to_ndjson_line())?);
            lines.push('\n');
        }
        fs::write(self.root.join("logs/events.jsonl"), lines)?;
        Ok(())
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        fs::write(
            self.root.join("summary.json"),
            serde_json::to_string_pretty(&summary.to_json())?,
        )?;
        Ok(())
    }

    pub fn write_search_profile(&self, profile: &serde_json::Value) -> Result<()> {
        fs::write(self.root.join("analysis/search_profile.json"), serde_json::to_string_pretty(profile)?)?;
        Ok(())
    }

    pub fn write_phase07_retrieval(&self, packets: &serde_json::Value) -> Result<()> {
        fs::write(self.root.join("analysis/phase07_retrieval.json"), serde_json::to_string_pretty(packets)?)?;
        Ok(())
    }

    pub fn write_phase08_extraction(&self, outcomes: &serde_json::Value) -> Result<()> {
        fs::write(self.root.join("analysis/phase08_extraction.json"), serde_json::to_string_pretty(outcomes)?)?;
        Ok(())
    }

    /// Mirror this run's directory as `outputs/{category}/{product_id}/latest/`
    /// when the run completed successfully — a plain recursive copy rather
    /// than a symlink so the layout works identically on every platform.
    pub fn update_latest_pointer(&self, output_root: &Path, category: &str, product_id: &str) -> Result<()> {
        let latest = output_root.join(category).join(product_id).join("latest");
        if latest.exists() {
            fs::remove_dir_all(&latest)?;
        }
        copy_dir_recursive(&self.root, &latest)?;
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}
