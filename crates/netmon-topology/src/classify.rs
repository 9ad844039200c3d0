//! Hostname keyword classification.
//!
//! Kinds are assigned from an ordered rule table; the first rule with a
//! keyword contained in the (lowercased) hostname wins.

use netmon_core::types::NodeKind;

/// One keyword-set → kind rule.
#[derive(Debug, Clone, Copy)]
pub struct KindRule {
    pub keywords: &'static [&'static str],
    pub kind: NodeKind,
}

pub const KIND_RULES: &[KindRule] = &[
    KindRule {
        keywords: &["tv", "shield", "firestick"],
        kind: NodeKind::SmartTv,
    },
    KindRule {
        keywords: &["camera", "cam"],
        kind: NodeKind::Camera,
    },
    KindRule {
        keywords: &["phone", "pixel", "iphone"],
        kind: NodeKind::Mobile,
    },
    KindRule {
        keywords: &["alexa", "echo", "google"],
        kind: NodeKind::VoiceAssistant,
    },
    KindRule {
        keywords: &["printer"],
        kind: NodeKind::Printer,
    },
    KindRule {
        keywords: &["desktop", "pc", "laptop", "macbook"],
        kind: NodeKind::Computer,
    },
    KindRule {
        keywords: &["proxmox"],
        kind: NodeKind::Server,
    },
    KindRule {
        keywords: &["opnsense"],
        kind: NodeKind::Router,
    },
];

/// PoE cameras hang off the main switch even inside the IoT subnets.
pub const CAMERA_KEYWORDS: &[&str] = &["camera", "cam"];

/// Streaming devices sit behind the streaming switch.
pub const STREAMING_KEYWORDS: &[&str] = &["tv", "firestick", "shield"];

/// Case-insensitive substring match against any keyword.
pub fn matches_any(hostname: &str, keywords: &[&str]) -> bool {
    let lower = hostname.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Classify a device by hostname. Unresolved hostnames are generic devices.
pub fn classify(hostname: Option<&str>) -> NodeKind {
    let Some(hostname) = hostname else {
        return NodeKind::Device;
    };

    KIND_RULES
        .iter()
        .find(|rule| matches_any(hostname, rule.keywords))
        .map(|rule| rule.kind)
        .unwrap_or(NodeKind::Device)
}
