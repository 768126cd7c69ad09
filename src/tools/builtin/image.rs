//! `read_image_and_analyze`: describe a local image with a vision model.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use futures::StreamExt;
use tracing::debug;

use crate::agent::events::RawEvent;
use crate::error::RelayError;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;
use crate::types::{GenerationSettings, ModelMessage, StreamEventType};

pub const IMAGE_TOOL_NAME: &str = "read_image_and_analyze";
const DEFAULT_HINT: &str = "Describe the contents of this image in detail.";

/// Guess an image MIME type from the file extension.
pub fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    }
}

/// Analyze one image. The vision call streams as internal-tagged model
/// events so it never reaches the caller as tokens.
pub async fn analyze_image(
    vision: &dyn ModelProvider,
    image_path: &str,
    query_hint: &str,
    ctx: &ToolExecutionContext,
) -> String {
    let path = Path::new(image_path);
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return format!("Error: file not found. Path: {image_path}");
        }
        Err(e) => return format!("Error: image analysis failed. {e}"),
    };

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let prompt = format!(
        "You are a skilled image analyst. Analyze the image according to this request: {query_hint}"
    );
    let request = ProviderRequest {
        messages: vec![ModelMessage::user_with_image(prompt, &encoded, guess_image_mime(path))],
        settings: GenerationSettings::builder().temperature(0.0).build(),
        tools: None,
    };

    match stream_vision(vision, &request, ctx).await {
        Ok(text) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| image_path.to_string());
            format!("[Image analysis - {name}]\n{text}")
        }
        Err(e) => format!("Error: image analysis failed. {e}"),
    }
}

async fn stream_vision(
    vision: &dyn ModelProvider,
    request: &ProviderRequest,
    ctx: &ToolExecutionContext,
) -> Result<String, RelayError> {
    let name = vision.model_id().to_string();
    debug!(model = %name, "vision call");
    ctx.emit(RawEvent::ChatModelStart {
        name: name.clone(),
        tags: vec![crate::agent::events::INTERNAL_TAG.to_string()],
    });

    let mut stream = vision.stream_text(request).await?;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        let delta = delta?;
        if delta.event_type == StreamEventType::TextDelta && !delta.text.is_empty() {
            ctx.emit(RawEvent::internal_token(name.clone(), delta.text.clone()));
            text.push_str(&delta.text);
        }
    }

    ctx.emit(RawEvent::ChatModelEnd {
        name,
        tags: vec![crate::agent::events::INTERNAL_TAG.to_string()],
    });
    Ok(text)
}

/// Create the `read_image_and_analyze` tool backed by `vision`.
pub fn image_analysis_tool(vision: Arc<dyn ModelProvider>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        IMAGE_TOOL_NAME,
        "Read a local image file and return a detailed text analysis of its contents. \
         A query hint can say what to focus on.",
        AgentToolParameters::object()
            .string("image_path", "Path of the image file to analyze", true)
            .string_with_default("query_hint", "What to focus on in the image", DEFAULT_HINT)
            .build(),
        move |args, ctx| {
            let vision = vision.clone();
            async move {
                let image_path = args.get_str("image_path")?;
                let hint = args.get_str_opt("query_hint").unwrap_or(DEFAULT_HINT);
                Ok(analyze_image(vision.as_ref(), image_path, hint, &ctx).await)
            }
        },
    ))
}
