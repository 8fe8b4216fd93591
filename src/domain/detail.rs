use crate::domain::{Allocation, Node, Port, Task};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Flat, display-ready view of a task placed on a node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskDetail {
    pub task_name: String,
    pub node_name: String,
    pub node_ip: String,
    pub driver: String,
    pub config: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub services: Vec<String>,
    pub dynamic_ports: Vec<Port>,
    pub reserved_ports: Vec<Port>,
}

impl TaskDetail {
    pub fn port(&self, label: &str) -> Option<u16> {
        self.dynamic_ports
            .iter()
            .chain(self.reserved_ports.iter())
            .find(|port| port.label == label)
            .map(|port| port.value)
    }
}

pub fn project_task_detail(task: &Task, allocation: &Allocation, node: &Node) -> TaskDetail {
    let mut dynamic_ports = Vec::new();
    let mut reserved_ports = Vec::new();
    for network in allocation.networks_for(&task.name) {
        dynamic_ports.extend(network.dynamic_ports.iter().cloned());
        reserved_ports.extend(network.reserved_ports.iter().cloned());
    }

    TaskDetail {
        task_name: task.name.clone(),
        node_name: node.name.clone(),
        node_ip: node.ip.clone().unwrap_or_default(),
        driver: task.driver.clone(),
        config: task.config.clone(),
        env: task.env.clone(),
        services: task.services.clone(),
        dynamic_ports,
        reserved_ports,
    }
}

/// Default rendering used by the detail panel and the one-shot `-task` output.
pub fn render_task_detail(detail: &TaskDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "* Name: {}", detail.task_name);
    let _ = writeln!(out, "* Node Name: {}", detail.node_name);
    let _ = writeln!(out, "* Node IP: {}", detail.node_ip);
    let _ = writeln!(out, "* Driver: {}", detail.driver);
    for (key, value) in &detail.config {
        let _ = writeln!(out, "  * {key}: {value}");
    }
    if !detail.env.is_empty() {
        out.push_str("* Env:\n");
        for (key, value) in &detail.env {
            let _ = writeln!(out, "  * {key}: {value}");
        }
    }
    if !detail.services.is_empty() {
        out.push_str("* Services:\n");
        for service in &detail.services {
            let _ = writeln!(out, "  * {service}");
        }
    }
    push_ports(&mut out, "Reserved Ports", &detail.reserved_ports);
    push_ports(&mut out, "Dynamic Ports", &detail.dynamic_ports);
    out
}

fn push_ports(out: &mut String, heading: &str, ports: &[Port]) {
    if ports.is_empty() {
        return;
    }
    let _ = writeln!(out, "* {heading}:");
    for port in ports {
        let _ = writeln!(out, "  * {} ({})", port.value, port.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NetworkResource;

    fn task(env: &[(&str, &str)]) -> Task {
        Task {
            name: "web".to_string(),
            driver: "docker".to_string(),
            config: BTreeMap::from([("image".to_string(), "nginx:1.27".to_string())]),
            env: env
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
            services: Vec::new(),
        }
    }

    fn node() -> Node {
        Node {
            id: "n1".to_string(),
            name: "worker-1".to_string(),
            ip: Some("10.0.0.7".to_string()),
        }
    }

    fn allocation(dynamic: &[(&str, u16)], reserved: &[(&str, u16)]) -> Allocation {
        let ports = |items: &[(&str, u16)]| {
            items
                .iter()
                .map(|(label, value)| Port {
                    label: (*label).to_string(),
                    value: *value,
                })
                .collect::<Vec<_>>()
        };
        Allocation {
            id: "a1".to_string(),
            name: "site.web[0]".to_string(),
            task_resources: BTreeMap::from([(
                "web".to_string(),
                vec![NetworkResource {
                    reserved_ports: ports(reserved),
                    dynamic_ports: ports(dynamic),
                }],
            )]),
            ..Allocation::default()
        }
    }

    #[test]
    fn renders_every_section_when_present() {
        let detail = project_task_detail(
            &task(&[("MODE", "prod")]),
            &allocation(&[("http", 23456)], &[("admin", 9000)]),
            &node(),
        );
        let text = render_task_detail(&detail);
        assert_eq!(
            text,
            "* Name: web\n* Node Name: worker-1\n* Node IP: 10.0.0.7\n* Driver: docker\n  * image: nginx:1.27\n* Env:\n  * MODE: prod\n* Reserved Ports:\n  * 9000 (admin)\n* Dynamic Ports:\n  * 23456 (http)\n"
        );
    }

    #[test]
    fn omits_empty_env_section() {
        let detail = project_task_detail(&task(&[]), &allocation(&[("http", 1)], &[]), &node());
        let text = render_task_detail(&detail);
        assert!(!text.contains("* Env:"));
        assert!(text.contains("* Dynamic Ports:"));
    }

    #[test]
    fn omits_port_sections_independently() {
        let only_reserved = render_task_detail(&project_task_detail(
            &task(&[]),
            &allocation(&[], &[("admin", 9000)]),
            &node(),
        ));
        assert!(only_reserved.contains("* Reserved Ports:"));
        assert!(!only_reserved.contains("* Dynamic Ports:"));

        let only_dynamic = render_task_detail(&project_task_detail(
            &task(&[]),
            &allocation(&[("http", 23456)], &[]),
            &node(),
        ));
        assert!(!only_dynamic.contains("* Reserved Ports:"));
        assert!(only_dynamic.contains("* Dynamic Ports:"));
    }

    #[test]
    fn lists_services_only_when_registered() {
        let plain = render_task_detail(&project_task_detail(&task(&[]), &allocation(&[], &[]), &node()));
        assert!(!plain.contains("* Services:"));

        let registered = Task {
            services: vec!["site-web".to_string(), "site-metrics".to_string()],
            ..task(&[("MODE", "prod")])
        };
        let text = render_task_detail(&project_task_detail(&registered, &allocation(&[("http", 1)], &[]), &node()));
        assert!(text.contains("* Env:\n  * MODE: prod\n* Services:\n  * site-web\n  * site-metrics\n* Dynamic Ports:\n"));
    }

    #[test]
    fn task_without_resources_and_node_without_ip() {
        let node = Node {
            ip: None,
            ..node()
        };
        let detail = project_task_detail(&task(&[]), &Allocation::default(), &node);
        assert_eq!(detail.node_ip, "");
        assert!(detail.dynamic_ports.is_empty());
        assert!(detail.reserved_ports.is_empty());
        assert_eq!(detail.port("http"), None);
    }
}
