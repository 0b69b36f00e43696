//! Module-name canonicalization.
//!
//! Upstream systems label the same module many ways: `Clientes`, `CLIENTS`,
//! `Configuración`, `config`. Everything funnels through [`canonical_key`]
//! so the rest of the engine only ever compares canonical keys.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Alias table: sanitized source spelling → canonical key.
///
/// Spellings are listed post-sanitization (uppercase, diacritics stripped).
/// A canonical key must never appear on the left mapped to a different
/// right-hand side, otherwise normalization would stop being idempotent.
static ALIASES: &[(&str, &str)] = &[
    ("CLIENTE", "CLIENT"),
    ("CLIENTES", "CLIENT"),
    ("CLIENTS", "CLIENT"),
    ("CUSTOMER", "CLIENT"),
    ("CUSTOMERS", "CLIENT"),
    ("PROVEEDOR", "PROVIDER"),
    ("PROVEEDORES", "PROVIDER"),
    ("PROVIDERS", "PROVIDER"),
    ("SUPPLIER", "PROVIDER"),
    ("SUPPLIERS", "PROVIDER"),
    ("INVENTARIO", "INVENTORY"),
    ("INVENTARIOS", "INVENTORY"),
    ("STOCK", "INVENTORY"),
    ("COMPRA", "PURCHASE"),
    ("COMPRAS", "PURCHASE"),
    ("PURCHASES", "PURCHASE"),
    ("PURCHASING", "PURCHASE"),
    ("ORGANIZACION", "ORG"),
    ("ORGANIZACIONES", "ORG"),
    ("ORGANIZATION", "ORG"),
    ("ORGANISATION", "ORG"),
    ("CONFIGURACION", "CONFIG"),
    ("CONFIGURACIONES", "CONFIG"),
    ("CONFIGURATION", "CONFIG"),
    ("SETTINGS", "CONFIG"),
    ("SUCURSAL", "BRANCH"),
    ("SUCURSALES", "BRANCH"),
    ("BRANCHES", "BRANCH"),
    ("REPORTE", "REPORT"),
    ("REPORTES", "REPORT"),
    ("REPORTS", "REPORT"),
    ("ALMACEN", "WAREHOUSE"),
    ("ALMACENES", "WAREHOUSE"),
    ("WAREHOUSES", "WAREHOUSE"),
];

/// Sanitize a raw module name into key form.
///
/// NFD-normalizes and strips combining marks (so `Configuración` →
/// `CONFIGURACION`), uppercases, then collapses every run of
/// non-alphanumeric characters into a single `_` with no leading/trailing
/// separator.
pub fn sanitize_key(name: &str) -> String {
    let stripped: String = name
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut pending_sep = false;
    for c in stripped.to_uppercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Canonicalize a module name.
///
/// `None` for blank input. Otherwise the sanitized form is resolved
/// through the alias table, falling back to the sanitized form itself so
/// unknown modules still get a stable key. Idempotent:
/// `canonical_key(canonical_key(x)) == canonical_key(x)`.
pub fn canonical_key(name: &str) -> Option<String> {
    let sanitized = sanitize_key(name);
    if sanitized.is_empty() {
        return None;
    }

    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == sanitized)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(sanitized);

    Some(canonical)
}
