//! Quotation documents.
//!
//! Renders a [`QuotationDocument`] through a Tera HTML template and converts
//! it to PDF with wkhtmltopdf when the binary is available. Without it, or
//! when conversion fails, the printable HTML is returned instead.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use quoteworks_core::config::{ConverterMode, DocumentsConfig};
use quoteworks_core::document::QuotationDocument;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

pub const QUOTATION_TEMPLATE: &str = "quotation.html.tera";

const EMBEDDED_QUOTATION_TEMPLATE: &str =
    include_str!("../../../templates/quotations/quotation.html.tera");

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct PdfGenerator {
    tera: Tera,
    wkhtmltopdf_path: Option<PathBuf>,
}

impl PdfGenerator {
    /// Loads `*.tera` files from the configured template directory. The
    /// embedded quotation template fills in when the directory lacks one.
    pub fn new(config: &DocumentsConfig) -> Result<Self, PdfError> {
        let tera = match &config.template_dir {
            Some(dir) => Tera::new(&format!("{}/**/*.tera", dir.display()))?,
            None => Tera::default(),
        };

        let wkhtmltopdf_path = match config.converter {
            ConverterMode::Auto => locate_wkhtmltopdf(),
            ConverterMode::Html => None,
        };

        Self::with_templates(tera, wkhtmltopdf_path)
    }

    /// Embedded template only, HTML output.
    pub fn html_only() -> Result<Self, PdfError> {
        Self::with_templates(Tera::default(), None)
    }

    fn with_templates(mut tera: Tera, wkhtmltopdf_path: Option<PathBuf>) -> Result<Self, PdfError> {
        if !tera.get_template_names().any(|name| name == QUOTATION_TEMPLATE) {
            tera.add_raw_template(QUOTATION_TEMPLATE, EMBEDDED_QUOTATION_TEMPLATE)?;
        }
        tera.autoescape_on(vec![".html.tera", ".html"]);
        Ok(Self { tera, wkhtmltopdf_path })
    }

    pub fn converts_to_pdf(&self) -> bool {
        self.wkhtmltopdf_path.is_some()
    }

    pub fn render_html(&self, document: &QuotationDocument) -> Result<String, PdfError> {
        let mut context = Context::new();
        context.insert("quotation", document);
        context.insert("company", &document.company);
        context.insert("items", &document.items);
        context.insert("materials", &document.materials);
        Ok(self.tera.render(QUOTATION_TEMPLATE, &context)?)
    }

    /// PDF bytes when wkhtmltopdf is usable, printable HTML otherwise.
    pub async fn generate(&self, document: &QuotationDocument) -> Result<PdfResult, PdfError> {
        let html = self.render_html(document)?;

        let Some(wkhtmltopdf) = &self.wkhtmltopdf_path else {
            return Ok(PdfResult::Html(html));
        };

        match convert_html_to_pdf(&html, wkhtmltopdf).await {
            Ok(pdf_bytes) => Ok(PdfResult::Pdf(pdf_bytes)),
            Err(error) => {
                warn!(
                    event_name = "document.conversion_failed",
                    quotation_no = %document.number,
                    error = %error,
                    "PDF conversion failed, falling back to HTML"
                );
                Ok(PdfResult::Html(html))
            }
        }
    }
}

fn locate_wkhtmltopdf() -> Option<PathBuf> {
    match which::which("wkhtmltopdf") {
        Ok(path) => {
            info!(path = %path.display(), "wkhtmltopdf found");
            Some(path)
        }
        Err(_) => {
            warn!("wkhtmltopdf not found in PATH - documents will be served as HTML");
            None
        }
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf: &Path) -> Result<Vec<u8>, PdfError> {
    let temp_dir = std::env::temp_dir();
    let stem = uuid::Uuid::new_v4();
    let html_path = temp_dir.join(format!("quotation_{stem}.html"));
    let pdf_path = temp_dir.join(format!("quotation_{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(wkhtmltopdf)
        .args(["--page-size", "A4"])
        .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .args(["--encoding", "utf-8"])
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let result = match output {
        Ok(output) if output.status.success() => {
            tokio::fs::read(&pdf_path).await.map_err(PdfError::from)
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(stderr = %stderr, "wkhtmltopdf failed");
            Err(PdfError::Conversion(stderr))
        }
        Err(error) => Err(PdfError::Io(error)),
    };

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(bytes) = &result {
        info!(size = bytes.len(), "PDF generated successfully");
    }
    result
}

pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    pub fn into_response(self, file_stem: &str) -> Response {
        match self {
            PdfResult::Pdf(bytes) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_stem}.pdf\""),
                    ),
                ],
                bytes,
            )
                .into_response(),
            PdfResult::Html(html) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
                html,
            )
                .into_response(),
        }
    }
}
