use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let input = || clap::arg!(<INPUT> "Local HTML file, or '-' for stdin");
    let url = || clap::arg!(--url <URL> "URL the page was captured from");
    let output = || {
        clap::arg!(-o --output <FILE> "Output file (default: stdout)")
            .value_parser(clap::value_parser!(std::path::PathBuf))
    };

    let mut cmd = clap::Command::new("tanapaste")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TanaPaste Contributors")
        .about("Export answer pages as Tana Paste outlines")
        .subcommand_required(true)
        .arg(
            clap::arg!(--config <FILE> "Configuration file")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--"scan-limit" <NUM> "Citation candidates examined per page (0 = no limit)").global(true))
        .arg(clap::arg!(--"max-citations" <NUM> "Maximum number of citations kept").global(true))
        .arg(clap::arg!(-v --verbose "Enable debug logging").global(true))
        .subcommand(
            clap::Command::new("extract")
                .about("Extract the query, answer, citations and media from a saved page")
                .arg(input())
                .arg(url())
                .arg(
                    clap::arg!(--variant <VARIANT> "Page variant")
                        .default_value("auto")
                        .value_parser(["auto", "search", "deepresearch", "labs"]),
                )
                .arg(
                    clap::arg!(-f --format <FORMAT> "Output format")
                        .default_value("json")
                        .value_parser(["json", "text"]),
                )
                .arg(output()),
        )
        .subcommand(
            clap::Command::new("format")
                .about("Format extracted content JSON as an outline")
                .arg(clap::arg!(--input <FILE> "Extracted content JSON (default: stdin)"))
                .arg(output()),
        )
        .subcommand(
            clap::Command::new("export")
                .about("Deliver a paste to a file")
                .arg(clap::arg!(--input <FILE> "Paste JSON or raw outline text (default: stdin)"))
                .arg(clap::arg!(-o --output <FILE> "Target file").required(true)),
        )
        .subcommand(
            clap::Command::new("run")
                .about("Extract, format and deliver a saved page")
                .arg(input())
                .arg(url())
                .arg(output()),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "tanapaste", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "tanapaste", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "tanapaste", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "tanapaste", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
