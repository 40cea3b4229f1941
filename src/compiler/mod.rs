//! Builds the route cache artifact.
//!
//! Rules come either from controller source files scanned on disk or from
//! the rules the `#[routes]` macro already embedded into the controllers.
//! Both end up in the same artifact, which [`RouteCache::load`] reads back.

mod cache;

pub use cache::{CACHE_FORMAT_VERSION, RouteCache};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use switchyard_meta::extract::directive_name;
use switchyard_meta::{ControllerDecl, RouteRule, controller_decl, extract_controller};
use syn::{Item, ItemImpl, Type};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Settings;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("route cache i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize route table: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CompileError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a compile run did to the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Written { rules: usize },
    /// The artifact already existed and the run was not forced.
    SkippedExisting,
    /// Nothing routable was found; the artifact was left untouched.
    NoRules,
}

#[derive(Debug, Clone)]
pub struct RouteCompiler {
    cache_path: PathBuf,
}

impl RouteCompiler {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    /// A compiler writing to the configured cache file, if there is one.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings.cache_file_path.as_ref().map(|path| Self::new(path.clone()))
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Scans `base_dir/<module>/*.rs` for every module and writes the rules
    /// found.
    pub fn compile<S: AsRef<str>>(
        &self,
        base_dir: &Path,
        modules: &[S],
        force: bool,
    ) -> Result<CompileOutcome, CompileError> {
        if !force && self.cache_path.exists() {
            debug!(path = %self.cache_path.display(), "Route cache exists, compile skipped");
            return Ok(CompileOutcome::SkippedExisting);
        }
        let rules = Self::scan(base_dir, modules);
        self.write(rules)
    }

    /// Writes rules that were already extracted, typically
    /// [`WorkerRegistry::controller_rules`](crate::registry::WorkerRegistry::controller_rules).
    pub fn compile_controllers(
        &self,
        rules: Vec<RouteRule>,
        force: bool,
    ) -> Result<CompileOutcome, CompileError> {
        if !force && self.cache_path.exists() {
            debug!(path = %self.cache_path.display(), "Route cache exists, compile skipped");
            return Ok(CompileOutcome::SkippedExisting);
        }
        self.write(rules)
    }

    fn write(&self, rules: Vec<RouteRule>) -> Result<CompileOutcome, CompileError> {
        if rules.is_empty() {
            info!(path = %self.cache_path.display(), "No routes found, route cache not written");
            return Ok(CompileOutcome::NoRules);
        }
        RouteCache::store(&self.cache_path, &rules)?;
        info!(path = %self.cache_path.display(), rules = rules.len(), "Route cache written");
        Ok(CompileOutcome::Written { rules: rules.len() })
    }

    /// Extracts the rules of every controller under the module directories.
    ///
    /// Files are visited in module order, then by file name, and parsed in
    /// parallel; the result keeps that order. Missing directories and files
    /// that fail to read or parse are skipped with a warning.
    pub fn scan<S: AsRef<str>>(base_dir: &Path, modules: &[S]) -> Vec<RouteRule> {
        let mut files = Vec::new();
        for module in modules {
            let dir = base_dir.join(module.as_ref());
            if !dir.is_dir() {
                warn!(module = module.as_ref(), path = %dir.display(), "Module directory not found");
                continue;
            }
            files.extend(
                WalkDir::new(&dir)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some("rs")),
            );
        }

        files
            .par_iter()
            .map(|path| scan_file(path))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}

fn scan_file(path: &Path) -> Vec<RouteRule> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read controller source");
            return Vec::new();
        }
    };
    let file = match syn::parse_file(&source) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse controller source");
            return Vec::new();
        }
    };
    let rules = extract_items(path, &file.items);
    debug!(path = %path.display(), rules = rules.len(), "Controller source scanned");
    rules
}

/// Pairs `#[controller]` structs with `#[routes]` impl blocks of the same
/// item list, descending into inline modules.
fn extract_items(path: &Path, items: &[Item]) -> Vec<RouteRule> {
    let mut decls: HashMap<String, ControllerDecl> = HashMap::new();
    for item in items {
        let Item::Struct(item) = item else { continue };
        let ident = item.ident.to_string();
        match controller_decl(&item.attrs, &ident) {
            Some(Ok(decl)) => {
                decls.insert(ident, decl);
            }
            Some(Err(e)) => {
                warn!(path = %path.display(), controller = %ident, error = %e, "Invalid controller directive");
            }
            None => {}
        }
    }

    let mut rules = Vec::new();
    for item in items {
        match item {
            Item::Impl(item) if is_routes_impl(item) => {
                let Some(ident) = self_ident(item) else { continue };
                let Some(decl) = decls.get(&ident) else {
                    warn!(path = %path.display(), target = %ident, "#[routes] impl without #[controller] struct");
                    continue;
                };
                let extraction = extract_controller(&decl.name, &decl.path, item);
                for skipped in &extraction.skipped {
                    warn!(
                        path = %path.display(),
                        controller = %decl.name,
                        method = %skipped.method,
                        reason = %skipped.reason,
                        "Method skipped during route extraction"
                    );
                }
                rules.extend(extraction.rules);
            }
            Item::Mod(module) => {
                if let Some((_, inner)) = &module.content {
                    rules.extend(extract_items(path, inner));
                }
            }
            _ => {}
        }
    }
    rules
}

fn is_routes_impl(item: &ItemImpl) -> bool {
    item.trait_.is_none()
        && item
            .attrs
            .iter()
            .any(|attr| directive_name(attr).as_deref() == Some("routes"))
}

fn self_ident(item: &ItemImpl) -> Option<String> {
    match &*item.self_ty {
        Type::Path(ty) => ty.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_meta::HttpMethod;

    const USERS: &str = r#"
        use switchyard::prelude::*;

        #[controller(path = "/users")]
        pub struct UserController;

        #[routes]
        impl UserController {
            #[get("/{id}")]
            pub fn show(&self, #[path_variable] id: i64) -> String {
                id.to_string()
            }

            #[post]
            #[rate_limit(total = 10, duration = "1m")]
            pub fn create(&self) -> String {
                String::new()
            }

            #[get("/hidden")]
            fn private(&self) {}
        }
    "#;

    const ORDERS: &str = r#"
        #[controller(path = "/orders", name = "Orders")]
        pub struct OrderController;

        #[routes]
        impl OrderController {
            #[request_mapping]
            pub fn index(&self) {}
        }
    "#;

    fn write_module(base: &Path, module: &str, files: &[(&str, &str)]) {
        let dir = base.join(module);
        fs::create_dir_all(&dir).unwrap();
        for (name, source) in files {
            fs::write(dir.join(name), source).unwrap();
        }
    }

    #[test]
    fn test_scan_collects_rules_in_file_order() {
        let base = tempfile::tempdir().unwrap();
        write_module(
            base.path(),
            "shop",
            &[("b_users.rs", USERS), ("a_orders.rs", ORDERS), ("broken.rs", "fn (")],
        );

        let rules = RouteCompiler::scan(base.path(), &["shop", "missing"]);
        let ids: Vec<_> = rules.iter().map(|r| r.handler_id.as_str()).collect();
        assert_eq!(ids, vec!["Orders@index", "UserController@show", "UserController@create"]);
        assert_eq!(rules[0].http_method, HttpMethod::All);
        assert_eq!(rules[1].path_pattern, "/users/{id}");
        assert_eq!(rules[2].rate_limit_policy.unwrap().window_seconds, 60);
    }

    #[test]
    fn test_scan_ignores_nested_directories() {
        let base = tempfile::tempdir().unwrap();
        write_module(base.path(), "shop", &[("users.rs", USERS)]);
        write_module(&base.path().join("shop"), "nested", &[("orders.rs", ORDERS)]);

        let rules = RouteCompiler::scan(base.path(), &["shop"]);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_compile_respects_force() {
        let base = tempfile::tempdir().unwrap();
        write_module(base.path(), "shop", &[("users.rs", USERS)]);
        let compiler = RouteCompiler::new(base.path().join("cache").join("routes.json"));

        let outcome = compiler.compile(base.path(), &["shop"], false).unwrap();
        assert_eq!(outcome, CompileOutcome::Written { rules: 2 });

        write_module(base.path(), "shop", &[("orders.rs", ORDERS)]);
        let outcome = compiler.compile(base.path(), &["shop"], false).unwrap();
        assert_eq!(outcome, CompileOutcome::SkippedExisting);
        assert_eq!(RouteCache::load(compiler.cache_path()).len(), 2);

        let outcome = compiler.compile(base.path(), &["shop"], true).unwrap();
        assert_eq!(outcome, CompileOutcome::Written { rules: 3 });
        assert_eq!(RouteCache::load(compiler.cache_path()).len(), 3);
    }

    #[test]
    fn test_no_rules_writes_nothing() {
        let base = tempfile::tempdir().unwrap();
        write_module(base.path(), "empty", &[("lib.rs", "pub struct Plain;")]);
        let compiler = RouteCompiler::new(base.path().join("routes.json"));

        let outcome = compiler.compile(base.path(), &["empty"], true).unwrap();
        assert_eq!(outcome, CompileOutcome::NoRules);
        assert!(!compiler.cache_path().exists());
    }

    #[test]
    fn test_compile_controllers() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = RouteCompiler::new(dir.path().join("routes.json"));
        let rules = vec![RouteRule::new("Ping@ping", HttpMethod::Get, "/ping")];

        let outcome = compiler.compile_controllers(rules.clone(), false).unwrap();
        assert_eq!(outcome, CompileOutcome::Written { rules: 1 });
        assert_eq!(RouteCache::load(compiler.cache_path()), rules);
    }

    #[test]
    fn test_from_settings() {
        assert!(RouteCompiler::from_settings(&Settings::default()).is_none());
        let settings = Settings::default().with_cache_file("/tmp/routes.json");
        let compiler = RouteCompiler::from_settings(&settings).unwrap();
        assert_eq!(compiler.cache_path(), Path::new("/tmp/routes.json"));
    }
}
