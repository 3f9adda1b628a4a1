//! Scenario tests for target discovery
//!
//! Each test starts from a container that is a valid target and changes
//! one thing about it.

use super::*;
use crate::models::{
    ContainerSnapshot, ExposedPort, LabelSet, NetworkEndpoint, NetworkLabelMap, PortType,
    ResolvedTarget,
};
use std::collections::{BTreeMap, HashMap};

const TARGET_NETWORK: &str = "metrics-net";

fn config() -> ResolverConfig {
    ResolverConfig {
        target_network: TARGET_NETWORK.to_string(),
        external_host: "docker-host-1".to_string(),
        instance_prefix: "host1".to_string(),
    }
}

/// Container with `prometheus_job=job1`, in the target network with IP
/// `ip1`, exposing TCP port 2000
fn create_test_container(name: &str) -> ContainerSnapshot {
    ContainerSnapshot {
        id: format!("id-{}", name.trim_start_matches('/')),
        names: vec![name.to_string()],
        labels: BTreeMap::from([("prometheus_job".to_string(), "job1".to_string())]),
        networks: HashMap::from([(
            TARGET_NETWORK.to_string(),
            NetworkEndpoint {
                ip_address: "ip1".to_string(),
                network_id: "net1".to_string(),
            },
        )]),
        ports: vec![ExposedPort::tcp(2000)],
        state: "running".to_string(),
        network_mode: "bridge".to_string(),
    }
}

fn resolve_one(container: &ContainerSnapshot) -> ResolvedTarget {
    resolve(container, &config(), &NetworkLabelMap::new())
}

mod resolver_scenarios {
    use super::*;

    #[test]
    fn test_single_port_container_is_exported() {
        let container = create_test_container("/app1");
        let target = resolve_one(&container);

        assert!(target.is_exported());
        assert_eq!(target.name, "/app1");
        assert_eq!(target.address, "ip1:2000");
        assert_eq!(target.labels["__address__"], "ip1:2000");
        assert_eq!(target.labels["instance"], "host1/app1:2000");
        assert_eq!(target.labels["job"], "job1");
        assert!(!target.labels.contains_key("prometheus_job"));
        assert!(target.is_in_target_network);
        assert!(target.has_tcp_ports);
        assert!(target.has_explicit_port);
        assert!(!target.scrape_external);
    }

    #[test]
    fn test_identity_labels() {
        let container = create_test_container("/app1");
        let target = resolve_one(&container);

        assert_eq!(target.labels["__meta_docker_container_id"], "id-app1");
        assert_eq!(target.labels["__meta_docker_container_name"], "/app1");
        assert_eq!(target.labels["__meta_docker_container_state"], "running");
        assert_eq!(target.labels["__meta_docker_container_network_mode"], "bridge");
        assert_eq!(target.labels["__meta_docker_network_ip"], "ip1");
        assert_eq!(target.labels["__meta_docker_port_private"], "2000");
        assert!(!target.labels.contains_key("__meta_docker_port_public"));
    }

    #[test]
    fn test_without_job_label() {
        let mut container = create_test_container("/app1");
        container.labels.clear();
        container
            .labels
            .insert("prometheus_team".to_string(), "core".to_string());

        let target = resolve_one(&container);

        assert!(!target.has_job);
        assert!(!target.is_exported());
        assert!(target.address.is_empty());
        // Only identity labels are computed
        assert!(!target.labels.contains_key("team"));
        assert_eq!(target.labels["__meta_docker_container_name"], "/app1");
    }

    #[test]
    fn test_not_in_target_network() {
        let mut container = create_test_container("/app1");
        let endpoint = container.networks.remove(TARGET_NETWORK).unwrap();
        container.networks.insert("other".to_string(), endpoint);

        let target = resolve_one(&container);

        assert!(target.has_job);
        assert!(!target.is_in_target_network);
        assert!(!target.is_exported());
        assert!(target.address.is_empty());
        assert!(!target.labels.contains_key("__address__"));
    }

    #[test]
    fn test_explicit_scrape_port_overrides() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_scrape_port".to_string(), "2001".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:2001");
        assert_eq!(target.labels["instance"], "host1/app1:2001");
        assert!(target.has_explicit_port);
        assert!(!target
            .labels
            .keys()
            .any(|k| k.starts_with("__meta_docker_container_label_prometheus_scrape_")));
    }

    #[test]
    fn test_scrape_interval_label() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_scrape_interval".to_string(), "5s".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.labels["__scrape_interval__"], "5s");
        assert!(!target.labels.contains_key("scrape_interval"));
    }

    #[test]
    fn test_scrape_path_label() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_scrape_path".to_string(), "/stuff/metrics".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.labels["__metrics_path__"], "/stuff/metrics");
    }

    #[test]
    fn test_generic_prometheus_label() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_key1".to_string(), "val1".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.labels["key1"], "val1");
        assert!(!target
            .labels
            .contains_key("__meta_docker_container_label_prometheus_key1"));
    }

    #[test]
    fn test_sanitized_generic_label() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus&=5b".to_string(), "val1".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.labels["_5b"], "val1");
        assert!(!target.labels.keys().any(|k| k.contains("&=")));
        assert!(!target
            .labels
            .contains_key("__meta_docker_container_label_prometheus__5b"));
    }

    #[test]
    fn test_other_labels_are_namespaced() {
        let mut container = create_test_container("/app1");
        container.labels.insert(
            "com.docker.compose.project".to_string(),
            "stack".to_string(),
        );

        let target = resolve_one(&container);

        assert_eq!(
            target.labels["__meta_docker_container_label_com_docker_compose_project"],
            "stack"
        );
    }

    #[test]
    fn test_lowest_of_two_ports_is_not_explicit() {
        let mut container = create_test_container("/app1");
        container.ports.push(ExposedPort::tcp(2002));

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:2000");
        assert!(!target.has_explicit_port);
        assert!(target.is_exported());
    }

    #[test]
    fn test_lower_added_port_wins() {
        let mut container = create_test_container("/app1");
        container.ports.push(ExposedPort::tcp(1000));

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:1000");
        assert!(!target.has_explicit_port);
    }

    #[test]
    fn test_explicit_port_outside_port_list() {
        let mut container = create_test_container("/app1");
        container.ports = vec![ExposedPort::tcp(1000)];
        container
            .labels
            .insert("prometheus_scrape_port".to_string(), "1998".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:1998");
        assert!(target.has_explicit_port);
        assert_eq!(target.labels["__meta_docker_port_private"], "1000");
    }

    #[test]
    fn test_duplicate_bindings_are_one_candidate() {
        let mut container = create_test_container("/app1");
        container.ports = vec![
            ExposedPort {
                port_type: PortType::Tcp,
                private_port: 2000,
                public_port: Some(32768),
                public_ip: Some("0.0.0.0".to_string()),
            },
            ExposedPort {
                port_type: PortType::Tcp,
                private_port: 2000,
                public_port: Some(32768),
                public_ip: Some("::".to_string()),
            },
        ];

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:2000");
        assert!(target.has_explicit_port);
        assert_eq!(target.labels["__meta_docker_port_public"], "32768");
        assert_eq!(target.labels["__meta_docker_port_public_ip"], "0.0.0.0");
    }

    #[test]
    fn test_no_ports() {
        let mut container = create_test_container("/app1");
        container.ports.clear();

        let target = resolve_one(&container);

        assert!(target.is_in_target_network);
        assert!(!target.has_tcp_ports);
        assert!(!target.is_exported());
        assert!(target.address.is_empty());
    }

    #[test]
    fn test_only_udp_port() {
        let mut container = create_test_container("/app1");
        container.ports[0].port_type = PortType::Udp;

        let target = resolve_one(&container);

        assert!(!target.has_tcp_ports);
        assert!(target.address.is_empty());
    }

    #[test]
    fn test_restarting_container_gets_synthetic_port() {
        let mut container = create_test_container("/app1");
        container.ports.clear();
        container
            .networks
            .get_mut(TARGET_NETWORK)
            .unwrap()
            .ip_address
            .clear();
        container
            .labels
            .insert("prometheus_scrape_port".to_string(), "9100".to_string());

        let target = resolve_one(&container);

        assert!(target.is_exported());
        assert!(target.has_explicit_port);
        assert_eq!(target.address, "1.1.1.1:9100");
        assert_eq!(target.labels["__meta_docker_network_ip"], "1.1.1.1");
    }

    #[test]
    fn test_synthetic_port_keeps_known_ip() {
        let mut container = create_test_container("/app1");
        container.ports.clear();
        container
            .labels
            .insert("prometheus_scrape_port".to_string(), "9100".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.address, "ip1:9100");
    }

    #[test]
    fn test_external_scrape_bypasses_network() {
        let mut container = create_test_container("/app1");
        container.networks.clear();
        container.ports = vec![ExposedPort {
            port_type: PortType::Tcp,
            private_port: 9100,
            public_port: Some(19100),
            public_ip: Some("0.0.0.0".to_string()),
        }];
        container
            .labels
            .insert("prometheus_scrape_external".to_string(), "True".to_string());

        let target = resolve_one(&container);

        assert!(target.scrape_external);
        assert!(target.is_in_target_network);
        assert!(target.is_exported());
        assert_eq!(target.address, "docker-host-1:9100");
        assert_eq!(target.labels["__meta_docker_port_public"], "19100");
    }

    #[test]
    fn test_external_scrape_in_network_uses_external_host() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_scrape_external".to_string(), "true".to_string());

        let target = resolve_one(&container);

        assert_eq!(target.address, "docker-host-1:2000");
        assert_eq!(target.labels["__meta_docker_network_ip"], "ip1");
    }

    #[test]
    fn test_network_labels_take_precedence() {
        let mut container = create_test_container("/app1");
        container
            .labels
            .insert("prometheus_env".to_string(), "from-container".to_string());

        let network_labels = NetworkLabelMap::from([(
            "net1".to_string(),
            LabelSet::from([
                ("__meta_docker_network_name".to_string(), "metrics-net".to_string()),
                ("env".to_string(), "from-network".to_string()),
            ]),
        )]);

        let target = resolve(&container, &config(), &network_labels);

        assert_eq!(target.labels["__meta_docker_network_name"], "metrics-net");
        assert_eq!(target.labels["env"], "from-network");
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let mut container = create_test_container("/app1");
        container
            .networks
            .get_mut(TARGET_NETWORK)
            .unwrap()
            .ip_address = "fd00::5".to_string();

        let target = resolve_one(&container);

        assert_eq!(target.address, "[fd00::5]:2000");
        assert_eq!(target.labels["instance"], "host1/app1:2000");
    }
}

mod extraction_scenarios {
    use super::*;

    fn target(name: &str, exported: bool) -> ResolvedTarget {
        ResolvedTarget {
            name: name.to_string(),
            has_job: true,
            is_in_target_network: true,
            has_tcp_ports: exported,
            ..Default::default()
        }
    }

    #[test]
    fn test_order_not_exported_first() {
        let mut targets = vec![target("b", true), target("a", false), target("c", true)];
        order_targets(&mut targets);

        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_order_groups_before_names() {
        let mut targets = vec![target("a", true), target("z", false), target("m", false)];
        order_targets(&mut targets);

        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["m", "z", "a"]);
    }

    #[test]
    fn test_skips_containers_without_name() {
        let mut unnamed = create_test_container("/unnamed");
        unnamed.names.clear();

        let extraction = extract_all(
            &[unnamed, create_test_container("/app1")],
            &config(),
            &NetworkLabelMap::new(),
        );

        assert_eq!(extraction.targets.len(), 1);
        assert_eq!(extraction.counters.total, 1);
        assert_eq!(extraction.targets[0].name, "/app1");
    }

    #[test]
    fn test_counters() {
        let exported = create_test_container("/exported");

        let mut no_job = create_test_container("/no-job");
        no_job.labels.clear();

        let mut outside = create_test_container("/outside");
        outside.networks.clear();

        let mut no_ports = create_test_container("/no-ports");
        no_ports.ports.clear();

        let mut ambiguous = create_test_container("/ambiguous");
        ambiguous.ports.push(ExposedPort::tcp(2002));

        let extraction = extract_all(
            &[exported, no_job, outside, no_ports, ambiguous],
            &config(),
            &NetworkLabelMap::new(),
        );

        assert_eq!(
            extraction.counters,
            ExtractionCounters {
                total: 5,
                without_job: 1,
                not_in_target_network: 1,
                no_tcp_ports: 1,
                ambiguous_ports: 1,
            }
        );

        let names: Vec<&str> = extraction.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["/no-job", "/no-ports", "/outside", "/ambiguous", "/exported"]
        );
        assert_eq!(extraction.targets.iter().filter(|t| t.is_exported()).count(), 2);
    }

    #[test]
    fn test_address_set_only_when_exported() {
        let mut no_job = create_test_container("/no-job");
        no_job.labels.clear();
        let mut no_ports = create_test_container("/no-ports");
        no_ports.ports.clear();

        let extraction = extract_all(
            &[create_test_container("/app1"), no_job, no_ports],
            &config(),
            &NetworkLabelMap::new(),
        );

        for target in &extraction.targets {
            assert_eq!(!target.address.is_empty(), target.is_exported(), "{}", target.name);
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let extraction = extract_all(&[], &config(), &NetworkLabelMap::new());
        assert!(extraction.targets.is_empty());
        assert_eq!(extraction.counters, ExtractionCounters::default());
    }
}
