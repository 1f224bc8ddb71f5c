use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load, parse and validate a topology from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading topology from: {:?}", config_path);

    let file = File::open(config_path).wrap_err_with(|| format!("Failed to open topology file {:?}", config_path))?;
    let config: Config =
        serde_yaml::from_reader(file).wrap_err_with(|| format!("Failed to parse topology file {:?}", config_path))?;

    config.validate()?;

    info!(
        "Loaded {} accounts, {} transit gateways, {} VPCs, {} peering connections",
        config.accounts.len(),
        config.network.transit_gateways.len(),
        config.network.vpcs.len(),
        config.network.vpc_peering.len()
    );
    for warning in lint_config(&config) {
        warn!("{}", warning);
    }

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub prefix: Option<String>,
    pub home_region: Option<String>,
}

/// Apply CLI overrides to a loaded topology
pub fn apply_overrides(config: &mut Config, overrides: &ConfigOverrides) -> Result<()> {
    if let Some(prefix) = &overrides.prefix {
        info!("Overriding prefix: {} -> {}", config.global.prefix, prefix);
        config.global.prefix = prefix.clone();
    }
    if let Some(home_region) = &overrides.home_region {
        info!("Overriding home region: {} -> {}", config.global.home_region, home_region);
        config.global.home_region = home_region.clone();
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

/// Suspicious but valid topology constructs
pub fn lint_config(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    for peering in &config.network.vpc_peering {
        let routed = config
            .network
            .vpcs
            .iter()
            .filter(|vpc| peering.vpcs.contains(&vpc.name))
            .flat_map(|vpc| vpc.route_tables.iter())
            .flat_map(|rt| rt.routes.iter())
            .any(|route| route.targets_peering(&peering.name));
        if !routed {
            warnings.push(format!(
                "Peering '{}' has no routes targeting it; traffic will not flow over it",
                peering.name
            ));
        }
    }

    for prefix_list in &config.network.prefix_lists {
        if prefix_list.entries.is_empty() {
            warnings.push(format!("Prefix list '{}' has no entries", prefix_list.name));
        }
    }

    for tgw in &config.network.transit_gateways {
        for rt in &tgw.route_tables {
            let used = config
                .network
                .vpcs
                .iter()
                .flat_map(|vpc| vpc.transit_gateway_attachments.iter())
                .filter(|att| att.transit_gateway.name == tgw.name && att.transit_gateway.account == tgw.account)
                .any(|att| att.route_table_associations.contains(&rt.name) || att.route_table_propagations.contains(&rt.name));
            if !used && rt.routes.is_empty() {
                warnings.push(format!("Route table '{}' of gateway '{}' is never used", rt.name, tgw.name));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOPOLOGY: &str = r#"
global:
  home_region: us-east-1
accounts:
  - name: Network
    id: "111111111111"
  - name: Dev
    id: "222222222222"
network:
  transit_gateways:
    - name: Core
      account: Network
      region: us-east-1
      route_tables:
        - name: segregated
        - name: spare
  vpcs:
    - name: App
      account: Dev
      region: us-east-1
      cidrs: ["10.1.0.0/16"]
      transit_gateway_attachments:
        - name: App-Core
          transit_gateway: { name: Core, account: Network }
          route_table_associations: [segregated]
"#;

    #[test]
    fn test_load_topology() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", TOPOLOGY).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.global.prefix, "accel");
        assert_eq!(config.network.vpcs.len(), 1);
        assert_eq!(lint_config(&config), vec!["Route table 'spare' of gateway 'Core' is never used"]);
    }

    #[test]
    fn test_invalid_topology_is_rejected() {
        let yaml = TOPOLOGY.replace("account: Dev", "account: Ghost");
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid network configuration"));
    }

    #[test]
    fn test_conflicting_vpc_placement_fails_to_load() {
        let yaml = TOPOLOGY.replace(
            "      account: Dev\n",
            "      account: Dev\n      deployment_targets: { accounts: [Dev] }\n",
        );
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse topology file"));
        assert!(format!("{:?}", err).contains("mutually exclusive"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/topology.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to open topology file"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", TOPOLOGY).unwrap();
        let mut config = load_config(temp_file.path()).unwrap();

        let overrides = ConfigOverrides {
            prefix: Some("lz".to_string()),
            home_region: None,
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.global.prefix, "lz");
        assert_eq!(config.global.home_region, "us-east-1");

        let empty = ConfigOverrides {
            prefix: Some(String::new()),
            home_region: None,
        };
        assert!(apply_overrides(&mut config, &empty).is_err());
    }
}
