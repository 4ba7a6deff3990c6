use crate::manifest::{parse_manifest_str, Manifest, ManifestError, ManifestFormat};

/// Built-in starter manifest describing the local AI stack.
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub manifest: &'static str,
}

impl Template {
    pub fn parse(&self) -> Result<Manifest, ManifestError> {
        parse_manifest_str(self.manifest, ManifestFormat::Json)
    }
}

pub const BUILTIN_TEMPLATES: &[Template] = &[
    Template {
        name: "local-ai",
        description: "Workflow engine, LLM servers, chat UI, databases, search, observability and proxy",
        manifest: r#"{
  "global": {
    "project_name": "localai",
    "default_host_ip": "127.0.0.1",
    "proxy_service": "caddy"
  },
  "services": {
    "caddy": {
      "enabled": true,
      "description": "Reverse proxy with automatic HTTPS",
      "category": "proxy",
      "reverse_proxy": true,
      "profiles": ["all"],
      "ports": [
        { "host_ip": "0.0.0.0", "host_port": 80, "container_port": 80 },
        { "host_ip": "0.0.0.0", "host_port": 443, "container_port": 443 },
        { "host_ip": "0.0.0.0", "host_port": 443, "container_port": 443, "protocol": "udp" }
      ]
    },
    "clickhouse": {
      "enabled": false,
      "description": "Analytics database backing Langfuse",
      "category": "observability",
      "profiles": ["all"],
      "ports": [{ "host_port": 8123, "container_port": 8123 }]
    },
    "langfuse-web": {
      "enabled": false,
      "description": "LLM tracing and evaluation UI",
      "category": "observability",
      "reverse_proxy": true,
      "depends_on": ["clickhouse", "postgres"],
      "profiles": ["all"],
      "ports": [{ "host_port": 3000, "container_port": 3000 }]
    },
    "n8n": {
      "enabled": true,
      "description": "Low-code workflow automation",
      "category": "workflow",
      "reverse_proxy": true,
      "depends_on": ["postgres"],
      "profiles": ["all"],
      "ports": [{ "host_ip": "${default_host_ip}", "host_port": 5678, "container_port": 5678 }]
    },
    "ollama-cpu": {
      "enabled": true,
      "description": "Local LLM server running on CPU",
      "category": "llm",
      "profiles": ["cpu"],
      "ports": [{ "host_port": 11434, "container_port": 11434 }]
    },
    "ollama-gpu": {
      "enabled": true,
      "description": "Local LLM server with NVIDIA acceleration",
      "category": "llm",
      "profiles": ["gpu-nvidia"],
      "ports": [{ "host_port": 11434, "container_port": 11434 }]
    },
    "open-webui": {
      "enabled": true,
      "description": "Chat interface for local models",
      "category": "interface",
      "reverse_proxy": true,
      "profiles": ["all"],
      "ports": [{ "host_port": 8080, "container_port": 8080 }]
    },
    "postgres": {
      "enabled": true,
      "description": "Relational database for workflows and tracing",
      "category": "database",
      "profiles": ["all"],
      "ports": [{ "host_port": 5433, "container_port": 5432 }]
    },
    "qdrant": {
      "enabled": true,
      "description": "Vector database for retrieval",
      "category": "database",
      "profiles": ["all"],
      "ports": [
        { "host_port": 6333, "container_port": 6333 },
        { "host_port": 6334, "container_port": 6334 }
      ]
    },
    "searxng": {
      "enabled": true,
      "description": "Private metasearch engine",
      "category": "search",
      "reverse_proxy": true,
      "profiles": ["all"],
      "ports": [{ "host_port": 8081, "container_port": 8080 }]
    }
  },
  "profiles": {
    "cpu": {
      "description": "Run models on the CPU",
      "included_services": ["ollama-cpu"]
    },
    "gpu-nvidia": {
      "description": "Run models on an NVIDIA GPU",
      "included_services": ["ollama-gpu"]
    },
    "none": {
      "description": "Everything except the bundled model server"
    }
  }
}
"#,
    },
];

pub fn get_template(name: &str) -> Option<&'static Template> {
    BUILTIN_TEMPLATES.iter().find(|t| t.name == name)
}

pub fn list_templates() -> &'static [Template] {
    BUILTIN_TEMPLATES
}
