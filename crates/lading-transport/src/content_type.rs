use mime::Mime;

/// Content type for `path`, guessed from its extension.
pub fn detect_content_type(path: &str) -> Mime {
    let name = path.rsplit('/').next().unwrap_or(path);
    let extension = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return mime::APPLICATION_OCTET_STREAM,
    };

    let essence = match extension.as_str() {
        "pom" | "xml" => return mime::TEXT_XML,
        "json" => return mime::APPLICATION_JSON,
        "txt" | "md5" | "sha1" | "sha256" | "sha384" | "sha512" | "asc" => return mime::TEXT_PLAIN,
        "html" | "htm" => return mime::TEXT_HTML,
        "css" => return mime::TEXT_CSS,
        "js" => return mime::APPLICATION_JAVASCRIPT,
        "jar" | "war" | "ear" => "application/java-archive",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };
    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
