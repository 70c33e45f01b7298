use anyhow::Result;

/// Print the OpenAPI document to stdout.
fn main() -> Result<()> {
    let doc = syncveil::api::openapi();

    println!("{}", serde_json::to_string_pretty(&doc)?);

    Ok(())
}
