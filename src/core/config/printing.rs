use crate::core::config::data::Config;

fn show(value: Option<&str>) -> &str {
    value.unwrap_or("(unset)")
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  [tool_backend]");
        println!("    base_url: {}", self.tool_backend.base_url());
        println!(
            "    transport: {}",
            show(self.tool_backend.transport.as_deref())
        );
        println!("    endpoint: {}", self.tool_backend.endpoint());
        println!("    tools_path: {}", self.tool_backend.tools_path());
        println!("    chat_path: {}", self.tool_backend.chat_path());
        println!("    health_path: {}", self.tool_backend.health_path());
        println!(
            "    timeout_ms: {}",
            self.tool_backend.timeout().as_millis()
        );
        println!(
            "    protocol_version: {}",
            show(self.tool_backend.protocol_version.as_deref())
        );
        println!("  [llm]");
        println!("    provider: {}", show(self.llm.provider.as_deref()));
        println!("    base_url: {}", self.llm.base_url());
        println!("    model: {}", self.llm.model());
        println!("    api_key_env: {}", self.llm.api_key_env());
        println!("  [decision]");
        println!("    strategy: {}", show(self.decision.strategy.as_deref()));
        println!("  [orchestrator]");
        println!(
            "    request_timeout_secs: {}",
            self.orchestrator.request_timeout().as_secs()
        );
        println!(
            "    history_window: {}",
            self.orchestrator.history_window()
        );
        match &self.orchestrator.system_prompt {
            Some(_) => println!("    system_prompt: (custom)"),
            None => println!("    system_prompt: (default)"),
        }
    }
}
