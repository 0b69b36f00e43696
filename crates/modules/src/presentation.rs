//! Navigation presentation per canonical module key.

use crate::grant::ModuleGrant;
use crate::normalize::canonical_key;

/// Resolved navigation entry for a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub route: String,
    pub icon: String,
    pub label: String,
}

struct ManifestEntry {
    key: &'static str,
    route: &'static str,
    icon: &'static str,
    label: &'static str,
}

/// Static navigation manifest per canonical key.
static MANIFEST: &[ManifestEntry] = &[
    ManifestEntry { key: "CLIENT", route: "/clients", icon: "team", label: "Clientes" },
    ManifestEntry { key: "PROVIDER", route: "/providers", icon: "shop", label: "Proveedores" },
    ManifestEntry { key: "INVENTORY", route: "/inventory", icon: "database", label: "Inventario" },
    ManifestEntry { key: "PURCHASE", route: "/purchases", icon: "shopping-cart", label: "Compras" },
    ManifestEntry { key: "ORG", route: "/organization", icon: "apartment", label: "Organización" },
    ManifestEntry { key: "CONFIG", route: "/settings", icon: "setting", label: "Configuración" },
    ManifestEntry { key: "BRANCH", route: "/branches", icon: "branches", label: "Sucursales" },
    ManifestEntry { key: "REPORT", route: "/reports", icon: "bar-chart", label: "Reportes" },
    ManifestEntry { key: "WAREHOUSE", route: "/warehouses", icon: "inbox", label: "Almacenes" },
];

/// System-reserved keys whose manifest route/label always win over
/// grant-supplied hints. Kept as an explicit table so the business rule
/// stays auditable in one place.
static MANIFEST_WINS: &[&str] = &["ORG", "CONFIG", "INVENTORY"];

/// Route presented when a module has no usable navigation entry.
pub const DEFAULT_ROUTE: &str = "/welcome";
const DEFAULT_ICON: &str = "appstore";
const DEFAULT_LABEL: &str = "Módulo";

fn manifest_entry(key: &str) -> Option<&'static ManifestEntry> {
    MANIFEST.iter().find(|entry| entry.key == key)
}

/// Resolve the navigation presentation for a grant.
///
/// The grant key is canonicalized first (raw key as fallback). Unknown keys
/// produce a diagnostic warning and a safe default rather than an error.
pub fn resolve_presentation(grant: &ModuleGrant) -> Presentation {
    let key = canonical_key(&grant.key).unwrap_or_else(|| grant.key.clone());

    let Some(entry) = manifest_entry(&key) else {
        tracing::warn!(module = %grant.key, canonical = %key, "module has no manifest entry, using default presentation");
        return Presentation {
            route: DEFAULT_ROUTE.to_string(),
            icon: DEFAULT_ICON.to_string(),
            label: grant
                .label
                .clone()
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
        };
    };

    if MANIFEST_WINS.contains(&key.as_str()) {
        // Tenants cannot override reserved navigation settings.
        return Presentation {
            route: entry.route.to_string(),
            icon: grant.icon.clone().unwrap_or_else(|| entry.icon.to_string()),
            label: entry.label.to_string(),
        };
    }

    Presentation {
        route: grant.route.clone().unwrap_or_else(|| entry.route.to_string()),
        icon: grant.icon.clone().unwrap_or_else(|| entry.icon.to_string()),
        label: grant.label.clone().unwrap_or_else(|| entry.label.to_string()),
    }
}
