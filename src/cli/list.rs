use console::style;

use crate::services::{operation_names, ServiceRegistry};

/// Services and their operations, one block per service.
pub fn render_services(registry: &ServiceRegistry) -> String {
    let mut out = String::new();
    for service in registry.iter() {
        out.push_str(&format!("{} - {}\n", style(service.name()).bold(), service.description()));
        for name in operation_names(service.as_ref()) {
            out.push_str(&format!("    {}\n", name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_renders_nothing() {
        assert!(render_services(&ServiceRegistry::new()).is_empty());
    }

    #[cfg(feature = "aws")]
    #[test]
    fn test_builtin_services_listed() {
        let rendered = console::strip_ansi_codes(&render_services(&ServiceRegistry::builtin())).to_string();
        assert!(rendered.contains("eip - "));
        assert!(rendered.contains("    check_unattached_eips"));
        assert!(rendered.contains("sg - "));
    }
}
