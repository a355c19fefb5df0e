/// Queue name from a queue URL: last path segment, query string dropped.
pub fn queue_name_from_url(queue_url: &str) -> String {
    let base = queue_url.split('?').next().unwrap_or("");
    base.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Queue name from a source identifier such as `arn:<partition>:queue:<region>:<name>`.
pub fn queue_name_from_source(source: &str) -> String {
    source.rsplit(':').next().unwrap_or("").to_string()
}
