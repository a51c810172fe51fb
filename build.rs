// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn package_arg(help: &'static str) -> Arg {
    Arg::new("package_name").required(true).help(help)
}

fn manifest_arg() -> Arg {
    Arg::new("manifest_url")
        .required(true)
        .help("URL or path of the package manifest")
}

fn build_cli() -> Command {
    Command::new("flux")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Flux Contributors")
        .about("Binary package manager with checksum-verified installs")
        .subcommand_required(false)
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .global(true)
                .default_value("/")
                .help("Install root directory"),
        )
        .arg(
            Arg::new("db_dir")
                .short('d')
                .long("db-dir")
                .global(true)
                .value_name("PATH")
                .help("Package database directory (default: <root>/var/lib/flux/packages)"),
        )
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .global(true)
                .value_name("PATH")
                .help("Directory for downloads and staging"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .default_value("30")
                .help("Network timeout in seconds"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Fail installs when manifest files are missing from the archive"),
        )
        .arg(
            Arg::new("no_scripts")
                .long("no-scripts")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Do not run packages' post-install scripts"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a package from its manifest URL")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(package_arg("Package name to remove")),
        )
        .subcommand(
            Command::new("update")
                .about("Update a package if its manifest carries a newer version")
                .arg(package_arg("Installed package name"))
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Update several packages, each given as NAME=MANIFEST_URL")
                .arg(
                    Arg::new("targets")
                        .required(true)
                        .num_args(1..)
                        .help("Packages and their manifests, e.g. hello=https://repo/hello.json"),
                ),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("depends")
                .about("Show dependencies of an installed package")
                .arg(package_arg("Package name")),
        )
        .subcommand(
            Command::new("rdepends")
                .about("Show installed packages that depend on a package")
                .arg(package_arg("Package name")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("flux.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
