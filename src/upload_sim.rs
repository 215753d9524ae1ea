//! Failed-upload simulator.
//!
//! Drives a local deployment's REST API through a multipart upload that is left dangling
//! while the operator breaks the storage backend, then cleans the upload and the draft up.

use crate::error::{Error, Result};
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

pub const DEFAULT_SERVER_URL: &str = "https://127.0.0.1:5000";
pub const DEFAULT_TOKEN_FILE: &str = ".upload_token";

pub const UPLOAD_KEY: &str = "large_file.bin";
const UPLOAD_SIZE: u64 = 107_374_182;
const PART_SIZE: u64 = 53_687_091;
const PARTS: u64 = 2;

const RESTART_STEPS: [&str; 5] = [
    "kill the server",
    "stop minio",
    "remove data/.minio.sys",
    "restart minio",
    "restart the server",
];

/// Read the cached token, or prompt for one and cache it
pub fn load_or_prompt_token<R: BufRead, W: Write>(
    path: &Path,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    if path.exists() {
        debug!("Reading upload token from {}", path.display());
        return Ok(fs::read_to_string(path)?.trim().to_string());
    }

    write!(output, "Please enter your upload token: ")?;
    output.flush()?;
    let mut token = String::new();
    input.read_line(&mut token)?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(Error::InvalidArgument("an upload token is required".to_string()));
    }

    fs::write(path, &token)?;
    Ok(token)
}

/// Body of the draft-creation request
pub fn draft_payload() -> Value {
    json!({
        "metadata": {"title": "Test Record"},
        "files": {"enabled": true}
    })
}

/// Body of the multipart-initiation request
pub fn multipart_payload() -> Value {
    json!([{
        "key": UPLOAD_KEY,
        "transfer": {"type": "M", "part_size": PART_SIZE, "parts": PARTS},
        "size": UPLOAD_SIZE
    }])
}

/// Identifiers and links of a freshly created draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLinks {
    pub id: String,
    pub files: String,
    pub record: String,
}

impl DraftLinks {
    pub fn from_response(body: &Value) -> Result<Self> {
        let field = |pointer: &str| {
            body.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Http(format!("draft response has no {}", pointer)))
        };
        Ok(Self {
            id: field("/id")?,
            files: field("/links/files")?,
            record: field("/links/self")?,
        })
    }

    pub fn upload_url(&self) -> String {
        format!("{}/{}", self.files.trim_end_matches('/'), UPLOAD_KEY)
    }
}

/// HTTP side of the simulation
pub struct UploadSimulator {
    client: Client,
    server: String,
    token: String,
}

impl UploadSimulator {
    /// Certificate checks are off: the target is a local deployment with a self-signed cert
    pub fn new(server: &str, token: &str) -> Result<Self> {
        let client = Client::builder().danger_accept_invalid_certs(true).build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn create_draft(&self) -> Result<DraftLinks> {
        let response = self
            .client
            .post(format!("{}/api/records", self.server))
            .bearer_auth(&self.token)
            .json(&draft_payload())
            .send()?;
        let body = expect_status(response, Some(StatusCode::CREATED), "Failed to create draft record")?;
        DraftLinks::from_response(&body)
    }

    pub fn initiate_upload(&self, draft: &DraftLinks) -> Result<Value> {
        let response = self
            .client
            .post(&draft.files)
            .bearer_auth(&self.token)
            .json(&multipart_payload())
            .send()?;
        expect_status(response, Some(StatusCode::CREATED), "Failed to initiate multipart upload")
    }

    pub fn delete_upload(&self, draft: &DraftLinks) -> Result<()> {
        let response = self
            .client
            .delete(draft.upload_url())
            .bearer_auth(&self.token)
            .send()?;
        expect_status(response, None, "Failed to delete upload").map(drop)
    }

    pub fn delete_draft(&self, draft: &DraftLinks) -> Result<()> {
        let response = self
            .client
            .delete(&draft.record)
            .bearer_auth(&self.token)
            .send()?;
        expect_status(response, None, "Failed to delete draft record").map(drop)
    }
}

/// Check the status (exact, or any 2xx when `expected` is `None`) and return the JSON body
fn expect_status(response: Response, expected: Option<StatusCode>, failure: &str) -> Result<Value> {
    let status = response.status();
    let text = response.text()?;
    check_status(status, expected, &text, failure)
}

fn check_status(
    status: StatusCode,
    expected: Option<StatusCode>,
    body: &str,
    failure: &str,
) -> Result<Value> {
    let ok = match expected {
        Some(code) => status == code,
        None => status.is_success(),
    };
    if !ok {
        return Err(Error::Http(format!("{}: {} {}", failure, status.as_u16(), body)));
    }
    Ok(serde_json::from_str(body).unwrap_or(Value::Null))
}

/// Run the whole scenario, pausing on `input` while the operator breaks storage
pub fn run<R: BufRead, W: Write>(
    server: &str,
    token_file: &Path,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    writeln!(output, "Simulating a failed upload...")?;
    let token = load_or_prompt_token(token_file, input, output)?;
    let simulator = UploadSimulator::new(server, &token)?;

    writeln!(output, "Creating a draft record ...")?;
    let draft = simulator.create_draft()?;
    writeln!(output, "Draft record created with ID: {}", draft.id)?;

    writeln!(output, "Initiating a multipart file upload ...")?;
    let upload = simulator.initiate_upload(&draft)?;
    writeln!(output, "JSON Response: {}", upload)?;

    writeln!(output, "File upload has been created.\n")?;
    writeln!(
        output,
        "Now please either press any key to continue or let's simulate expired upload:"
    )?;
    for (i, step) in RESTART_STEPS.iter().enumerate() {
        writeln!(output, "   {}. {}", i + 1, step)?;
    }
    writeln!(output, "Then press Enter to continue...")?;
    output.flush()?;
    input.read_line(&mut String::new())?;

    writeln!(output, "Now trying to delete the upload...")?;
    simulator.delete_upload(&draft)?;
    writeln!(output, "Upload deleted successfully.")?;

    writeln!(output, "Now deleting the draft record...")?;
    simulator.delete_draft(&draft)?;
    writeln!(output, "Draft record deleted successfully.")?;

    info!("Upload simulation finished for draft {}", draft.id);
    Ok(())
}
