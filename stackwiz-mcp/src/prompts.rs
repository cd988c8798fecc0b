//! Guided deployment prompts served over MCP `prompts/*`

pub struct DeploymentPrompt {
    pub name: &'static str,
    pub description: &'static str,
    pub text: &'static str,
}

pub static PROMPTS: [DeploymentPrompt; 3] = [
    DeploymentPrompt {
        name: "deploy-web-app",
        description: "Gather what is needed to deploy a web application as a stack",
        text: "Help me deploy a web application with StackWiz. Ask me for:

1. A stack name (lowercase letters, digits and hyphens).
2. The container image and tag, and the port the app listens on inside the container.
3. The domain, or accept the default {name}.{default domain}.
4. Any environment variables the app needs.
5. Whether to start it right away and create its DNS record.

Then call validate_stack_config with check_conflicts, show me any errors or warnings, \
and call create_stack once the configuration is valid.",
    },
    DeploymentPrompt {
        name: "setup-database",
        description: "Plan a database stack with persistent storage",
        text: "Help me run a database as a StackWiz stack. Ask me for:

1. The engine and version (PostgreSQL, MySQL, MongoDB, Redis, ...).
2. A stack name and the port to route.
3. Credentials to pass as environment variables.
4. Whether it should be reachable through the proxy at all.

Warn me about well-known port collisions, then validate with validate_stack_config \
before calling create_stack. Data lives in the stack's data directory and is archived, \
not deleted, when the stack is removed without purge_volumes.",
    },
    DeploymentPrompt {
        name: "create-api-service",
        description: "Deploy an API service and verify it comes up healthy",
        text: "Help me deploy an API service with StackWiz. Ask me for:

1. A stack name, the image and the port the API listens on.
2. The public domain and whether traffic should go through the Cloudflare proxy.
3. Environment variables for configuration and secrets.

Create it with create_stack (auto_start and create_dns on), then check it with \
manage_stack action logs and list_stacks with include_status, and report the URL.",
    },
];

pub fn find(name: &str) -> Option<&'static DeploymentPrompt> {
    PROMPTS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_are_found_by_name() {
        for name in ["deploy-web-app", "setup-database", "create-api-service"] {
            assert_eq!(find(name).map(|p| p.name), Some(name));
        }
        assert!(find("deploy").is_none());
    }

    #[test]
    fn prompts_point_at_real_tools() {
        for prompt in &PROMPTS {
            assert!(prompt.text.contains("create_stack"), "{}", prompt.name);
        }
    }
}
