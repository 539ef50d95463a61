//! Package upload, report and download handlers.

use crate::adapters::JobDirs;
use crate::domain::model::{PackageOptions, PackageReport};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::utils::error::{ExhibitError, Result};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use std::path::PathBuf;

pub const FILES_FIELD: &str = "files";

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn optional_text(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// 套用單一表單欄位，未知欄位忽略
pub fn apply_option(options: &mut PackageOptions, name: &str, value: &str) -> Result<()> {
    match name {
        "visa_type" => options.visa_type = value.parse()?,
        "numbering_style" => options.numbering_style = value.parse()?,
        "quality_preset" => options.quality_preset = value.parse()?,
        "enable_compression" => options.enable_compression = parse_flag(value),
        "enable_classification" => options.enable_classification = parse_flag(value),
        "add_toc" => options.add_toc = parse_flag(value),
        "merge_pdfs" => options.merge_pdfs = parse_flag(value),
        "beneficiary_name" => options.beneficiary_name = optional_text(value),
        "case_name" => options.case_name = optional_text(value),
        other => tracing::debug!("Ignoring unknown form field: {}", other),
    }
    Ok(())
}

async fn receive_upload(
    state: &AppState,
    job: &JobDirs,
    multipart: &mut Multipart,
) -> std::result::Result<(Vec<PathBuf>, PackageOptions), ApiError> {
    let mut options = state.service.default_options();
    let mut inputs = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILES_FIELD {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request("File part is missing a file name"))?;
            let data = field.bytes().await?;
            if data.is_empty() {
                tracing::warn!("⚠️ Ignoring empty upload: {}", file_name);
                continue;
            }
            let stored = state
                .service
                .workspace()
                .store_upload(job, &file_name, &data)
                .await?;
            tracing::info!("📦 Received {} ({} bytes)", file_name, data.len());
            inputs.push(stored);
        } else {
            let value = field.text().await?;
            apply_option(&mut options, &name, &value)?;
        }
    }

    Ok((inputs, options))
}

// ── Packages ──

pub async fn create_package(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<(StatusCode, Json<PackageReport>), ApiError> {
    let workspace = state.service.workspace();
    let job = workspace.create_job().await?;

    let (inputs, options) = match receive_upload(&state, &job, &mut multipart).await {
        Ok(received) => received,
        Err(e) => {
            discard(&state, &job).await;
            return Err(e);
        }
    };

    if inputs.is_empty() {
        discard(&state, &job).await;
        return Err(ApiError::bad_request("No files uploaded"));
    }

    tracing::info!(
        "🚀 Package {} requested: {} files, {}",
        job.id,
        inputs.len(),
        options.visa_type
    );

    let report = match state.service.build_job(&job, inputs, options).await {
        Ok(report) => report,
        Err(e) => {
            discard(&state, &job).await;
            return Err(e.into());
        }
    };

    if let Err(e) = workspace.remove_job_inputs(&job).await {
        tracing::warn!("⚠️ Could not remove job inputs for {}: {}", job.id, e);
    }

    state.reports.write().await.insert(report.id, report.clone());
    Ok((StatusCode::CREATED, Json(report)))
}

async fn discard(state: &AppState, job: &JobDirs) {
    if let Err(e) = state.service.workspace().remove_job(job).await {
        tracing::warn!("⚠️ Could not clean job {}: {}", job.id, e);
    }
}

async fn find_report(state: &AppState, raw_id: &str) -> Result<PackageReport> {
    let job = state.service.workspace().lookup_job(raw_id)?;

    if let Some(report) = state.reports.read().await.get(&job.id) {
        return Ok(report.clone());
    }

    let report = state
        .service
        .load_report(&job)
        .await?
        .ok_or_else(|| ExhibitError::not_found(format!("Unknown package id: {}", raw_id)))?;
    state.reports.write().await.insert(report.id, report.clone());
    Ok(report)
}

pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<PackageReport>, ApiError> {
    let report = find_report(&state, &id).await?;
    Ok(Json(report))
}

pub async fn download_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let report = find_report(&state, &id).await?;

    if !tokio::fs::try_exists(&report.output_file)
        .await
        .map_err(ExhibitError::from)?
    {
        return Err(ExhibitError::not_found(format!(
            "Package file no longer exists: {}",
            id
        ))
        .into());
    }

    let data = tokio::fs::read(&report.output_file)
        .await
        .map_err(ExhibitError::from)?;
    let file_name = report
        .output_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("exhibit_package.pdf")
        .to_string();
    let content_type = mime_guess::from_path(&report.output_file)
        .first_or_octet_stream()
        .to_string();

    tracing::info!("📁 Serving {} ({} bytes)", file_name, data.len());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        data,
    )
        .into_response())
}

// ── Service ──

pub async fn health() -> &'static str {
    "ok"
}

pub async fn public_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.service.config().public_summary())
}
