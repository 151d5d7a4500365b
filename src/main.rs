use anyhow::Result;
use dumpbrowser::config::{Config, Invocation, USAGE};
use dumpbrowser::logging::{log, obj, v_str, Domain, Level};
use dumpbrowser::server::DumpServer;

fn main() -> Result<()> {
    let config = match Config::from_env()?.with_args(std::env::args().skip(1))? {
        Invocation::Serve(config) => config,
        Invocation::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let server = DumpServer::bind(config)?;
    log(
        Level::Info,
        Domain::System,
        "listening",
        obj(&[
            ("url", v_str(&format!("http://{}/", server.local_addr()))),
            ("msg", v_str("GET /STOP to shut down")),
        ]),
    );
    server.run()
}
