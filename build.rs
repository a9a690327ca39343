use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a settings template next to the build output
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# tsflow configuration template
# Copy this file to 'tsflow.toml' and adjust the values you need.
# Every key can also be set through a TSFLOW_<KEY> environment variable.

service_id = 0x4698
provider_name = "tsflow"
service_name = "tsflow live"
psi_interval_ms = 100
pcr_interval_ms = 40
emit_sdt = false

# endpoint = "udp://127.0.0.1:9000"
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
