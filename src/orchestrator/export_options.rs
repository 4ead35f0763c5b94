//! Export options property list written before `xcodebuild -exportArchive`.

use crate::config::ReleaseEnvironment;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

const PLIST_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
"#;

/// Signing and distribution settings for one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub method: String,
    pub signing_certificate: Option<String>,
    pub team_id: Option<String>,
    /// Bundle identifier -> provisioning profile name
    pub provisioning_profiles: BTreeMap<String, String>,
}

impl ExportOptions {
    pub fn from_environment(environment: &ReleaseEnvironment) -> Self {
        ExportOptions {
            method: environment.export_method.clone(),
            signing_certificate: environment.signing_certificate.clone(),
            team_id: environment.team_id.clone(),
            provisioning_profiles: environment.provisioning_profiles.clone(),
        }
    }

    /// Render as an XML property list.
    ///
    /// Explicit provisioning profiles switch signing to manual; without them
    /// Xcode's automatic signing is left in charge.
    pub fn to_plist(&self) -> String {
        let mut body = String::new();
        push_entry(&mut body, 1, "method", &self.method);
        if let Some(certificate) = &self.signing_certificate {
            push_entry(&mut body, 1, "signingCertificate", certificate);
        }
        if let Some(team) = &self.team_id {
            push_entry(&mut body, 1, "teamID", team);
        }
        if !self.provisioning_profiles.is_empty() {
            push_entry(&mut body, 1, "signingStyle", "manual");
            let _ = writeln!(body, "\t<key>provisioningProfiles</key>");
            let _ = writeln!(body, "\t<dict>");
            for (bundle_id, profile) in &self.provisioning_profiles {
                push_entry(&mut body, 2, bundle_id, profile);
            }
            let _ = writeln!(body, "\t</dict>");
        }

        format!("{}<dict>\n{}</dict>\n</plist>\n", PLIST_HEADER, body)
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_plist())
    }
}

fn push_entry(body: &mut String, depth: usize, key: &str, value: &str) {
    let indent = "\t".repeat(depth);
    let _ = writeln!(body, "{}<key>{}</key>", indent, escape_xml(key));
    let _ = writeln!(body, "{}<string>{}</string>", indent, escape_xml(value));
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
