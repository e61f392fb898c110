//! mtools command-line interface
//!
//! Thin front end over the library: each command parses one file, prints a
//! summary or writes a derived file.
//!
//! # Usage
//!
//! ```bash
//! # Summarise the amino-acid library, or dump one component as JSON
//! mtools library
//! mtools library amino98.lib --component ALA --json
//!
//! # Look up force-field parameters by atom type
//! mtools params parm.lib C0 C0 N0
//!
//! # Mean energy gap and mapping extrema
//! mtools gap gap.out
//! mtools mapping mapping.out 4
//!
//! # Put Gaussian ESP charges into a library component
//! mtools charges qm.log LIG esp --library ligand.lib
//!
//! # Gaussian input deck from a geometry, XYZ trajectory from a log
//! mtools gjf ligand.xyz ligand.inp
//! mtools xyz opt.log
//!
//! # Write a settings template
//! mtools ci mtools.cfg
//! ```
//!
//! Library paths default to the `[libraries]` section of the settings files.

use log::{info, warn, LevelFilter};
use mtools::evb_library::EvbLibrary;
use mtools::gap::GapFile;
use mtools::gaussian::{ChargeScheme, GaussianInput, GaussianLog};
use mtools::library::{AminoLibrary, GROUP_CHARGE_TOLERANCE};
use mtools::mapping::{self, ExtremumKind, ReactionProfile};
use mtools::parameters::ParametersLibrary;
use mtools::parser::TextFormat;
use mtools::settings::SettingsManager;
use mtools::{io, Molecule};
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

type CliResult = Result<(), Box<dyn Error>>;

/// Command arguments split into positionals and `--flag [value]` options.
struct Args<'a> {
    positional: Vec<&'a str>,
    flags: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> Args<'a> {
    /// `valued` lists the flags that take a value.
    fn parse(args: &'a [String], valued: &[&str]) -> Result<Self, Box<dyn Error>> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg.starts_with("--") {
                if valued.contains(&arg.as_str()) {
                    let value = iter
                        .next()
                        .ok_or_else(|| format!("{} needs a value", arg))?;
                    flags.push((arg.as_str(), Some(value.as_str())));
                } else {
                    flags.push((arg.as_str(), None));
                }
            } else {
                positional.push(arg.as_str());
            }
        }
        Ok(Self { positional, flags })
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|(f, _)| *f == name)
    }

    fn value(&self, name: &str) -> Option<&'a str> {
        self.flags
            .iter()
            .find(|(f, _)| *f == name)
            .and_then(|(_, v)| *v)
    }

    fn require(&self, index: usize, what: &str) -> Result<&'a str, Box<dyn Error>> {
        self.positional
            .get(index)
            .copied()
            .ok_or_else(|| format!("missing {}", what).into())
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }
    if args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(0);
    }

    let settings = match SettingsManager::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    let level = settings.logging().level_filter().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .init();
    info!("Configuration loaded from: {}", settings.config_source());

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "library" => run_library(rest, &settings),
        "params" => run_params(rest, &settings),
        "evb" => run_evb(rest, &settings),
        "gap" => run_gap(rest),
        "mapping" => run_mapping(rest, &settings),
        "charges" => run_charges(rest, &settings),
        "gjf" => run_gjf(rest, &settings),
        "xyz" => run_xyz(rest),
        "ci" => run_create_settings_template(rest),
        other => {
            eprintln!("Error: Unknown command: {}", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Prints usage information to stderr.
fn print_usage(program_name: &str) {
    eprintln!("mtools - Molaris-XG QM/MM file toolkit");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} library [amino.lib] [--component NAME] [--json]", program_name);
    eprintln!("                    Summarise an amino-acid library or print one component");
    eprintln!("  {} params [parm.lib] [TYPE...]", program_name);
    eprintln!("                    Count ENZYMIX parameters, or look up 1-4 atom types");
    eprintln!("  {} evb [evb.lib]", program_name);
    eprintln!("                    Count EVB parameters");
    eprintln!("  {} gap <gap.out>", program_name);
    eprintln!("                    Energy-gap statistics");
    eprintln!("  {} mapping <mapping.out> [degree]", program_name);
    eprintln!("                    Extrema and free energies of a mapping profile");
    eprintln!("  {} charges <gaussian.log> <component> [mulliken|esp] [--library amino.lib]", program_name);
    eprintln!("                    Replace component charges with charges from a Gaussian log");
    eprintln!("  {} gjf <geometry.xyz|gaussian.log> [output.inp]", program_name);
    eprintln!("                    Write a Gaussian input deck");
    eprintln!("  {} xyz <gaussian.log> [output.xyz]", program_name);
    eprintln!("                    Write the geometry frames of a Gaussian log");
    eprintln!("  {} ci mtools.cfg", program_name);
    eprintln!("                    Create a settings template file");
    eprintln!();
    eprintln!("Library paths default to the [libraries] section of mtools.cfg.");
}

fn library_path<'a>(given: Option<&'a str>, default: &'a Path) -> &'a Path {
    given.map(Path::new).unwrap_or(default)
}

fn run_library(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &["--component"])?;
    let path = library_path(args.positional.first().copied(), &settings.libraries().amino);
    let library = AminoLibrary::from_file(path)?;

    if let Some(name) = args.value("--component") {
        let component = library
            .get(name)
            .ok_or_else(|| format!("component {} not found in {}", name, path.display()))?;
        if args.flag("--json") {
            println!("{}", serde_json::to_string_pretty(component)?);
        } else {
            print!("{}", component.render()?);
        }
        return Ok(());
    }

    if args.flag("--json") {
        println!("{}", serde_json::to_string_pretty(&library)?);
        return Ok(());
    }
    println!("{:>6}  {:<8} {:>6} {:>6} {:>10}", "serial", "name", "atoms", "bonds", "charge");
    for c in &library.components {
        println!(
            "{:>6}  {:<8} {:>6} {:>6} {:>10.4}",
            c.serial,
            c.name,
            c.atoms.len(),
            c.bonds.len(),
            c.total_charge()
        );
    }
    println!("{} components", library.len());
    Ok(())
}

fn run_params(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let (path, types) = match args.positional.split_first() {
        Some((first, types)) if Path::new(first).is_file() => (Path::new(*first), types),
        _ => (settings.libraries().parameters.as_path(), &args.positional[..]),
    };
    let library = ParametersLibrary::from_file(path)?;

    let found = match types {
        [] => {
            println!("bonds      {:>6}", library.bonds.len());
            println!("angles     {:>6}", library.angles.len());
            println!("torsions   {:>6}", library.torsions.len());
            println!("impropers  {:>6}", library.impropers.len());
            println!("vdw        {:>6}", library.vdw.len());
            println!("total      {:>6}", library.len());
            return Ok(());
        }
        [t] => library.get_vdw(t).map(|p| {
            format!("vdw {}: A = {} B = {} mass = {}", p.atom_type, p.repulsive, p.attractive, p.mass)
        }),
        [a, b] => {
            let bond = library
                .get_bond(a, b)
                .map(|p| format!("bond {}-{}: k = {} r0 = {}", p.types.0, p.types.1, p.k, p.r0));
            let improper = library
                .get_improper(a, b)
                .map(|p| format!("improper {}-{}: k = {} phi0 = {}", p.types.0, p.types.1, p.k, p.phi0));
            match (bond, improper) {
                (None, None) => None,
                (bond, improper) => Some(bond.into_iter().chain(improper).collect::<Vec<_>>().join("\n")),
            }
        }
        [a, b, c] => library.get_angle(a, b, c).map(|p| {
            format!(
                "angle {}-{}-{}: k = {} theta0 = {}",
                p.types.0, p.types.1, p.types.2, p.k, p.theta0
            )
        }),
        [a, b, c, d] => library.get_torsion(a, b, c, d).map(|p| {
            format!(
                "torsion {}: n = {} k = {} phase = {}",
                p.types.join("-"),
                p.periodicity,
                p.k,
                p.phase
            )
        }),
        _ => return Err("give between one and four atom types".into()),
    };

    match found {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => Err(format!("no parameter for {}", types.join("-")).into()),
    }
}

fn run_evb(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let path = library_path(args.positional.first().copied(), &settings.libraries().evb);
    let library = EvbLibrary::from_file(path)?;
    println!("atoms        {:>6}", library.atoms.len());
    println!("morse        {:>6}", library.morse.len());
    println!("angles       {:>6}", library.angles.len());
    println!("torsions     {:>6}", library.torsions.len());
    println!("offdiagonal  {:>6}", library.offdiagonal.len());
    println!("total        {:>6}", library.len());
    Ok(())
}

fn run_gap(rest: &[String]) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let gap = GapFile::from_file(Path::new(args.require(0, "gap file")?))?;
    println!("steps     {}", gap.len());
    println!("states    {}", gap.states());
    match gap.mean_gap() {
        Some(mean) => println!("mean gap  {:.4} kcal/mol", mean),
        None => warn!("gap file has no steps"),
    }
    Ok(())
}

fn run_mapping(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let path = Path::new(args.require(0, "mapping file")?);
    let degree = match args.positional.get(1) {
        Some(d) => d.parse().map_err(|_| format!("invalid degree '{}'", d))?,
        None => settings.mapping().degree,
    };
    let (mapping, extrema) = mapping::load_extrema(path, degree)?;
    println!("{} bins, degree {} fit", mapping.len(), degree);
    for e in &extrema {
        let kind = match e.kind {
            ExtremumKind::Minimum => "min",
            ExtremumKind::Maximum => "max",
        };
        println!("{}  gap {:>10.3}  dG {:>10.3}", kind, e.gap, e.value);
    }
    match ReactionProfile::from_extrema(&extrema) {
        Some(profile) => {
            println!("activation  {:>10.3} kcal/mol", profile.activation);
            println!("reaction    {:>10.3} kcal/mol", profile.reaction);
        }
        None => warn!("fitted profile is not a double well"),
    }
    Ok(())
}

fn run_charges(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &["--library"])?;
    let log = GaussianLog::from_file(Path::new(args.require(0, "Gaussian log")?))?;
    let name = args.require(1, "component name")?;
    let scheme: ChargeScheme = match args.positional.get(2) {
        Some(s) => s.parse()?,
        None => settings.gaussian().charge_scheme,
    };
    let path = library_path(args.value("--library"), &settings.libraries().amino);

    let mut library = AminoLibrary::from_file(path)?;
    let component = library
        .get_mut(name)
        .ok_or_else(|| format!("component {} not found in {}", name, path.display()))?;
    let charges = log
        .charges(scheme)
        .ok_or_else(|| format!("no {:?} charges in the Gaussian log", scheme))?;
    component.assign_charges(charges)?;

    for group in component.unbalanced_groups(GROUP_CHARGE_TOLERANCE) {
        warn!(
            "group {} charge {:.4} is not integral",
            group + 1,
            component.group_charge(&component.groups[group])
        );
    }
    info!("{} total charge {:.4}", component.name, component.total_charge());
    print!("{}", component.render()?);
    Ok(())
}

fn read_geometry(path: &Path) -> Result<Molecule, Box<dyn Error>> {
    let is_log = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("log") | Some("out")
    );
    if is_log {
        Ok(GaussianLog::from_file(path)?.final_molecule(None)?)
    } else {
        Ok(io::read_xyz(path)?)
    }
}

fn run_gjf(rest: &[String], settings: &SettingsManager) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let source = Path::new(args.require(0, "geometry file")?);
    let output = args
        .positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| source.with_extension("inp"));

    let molecule = read_geometry(source)?;
    let mut input = GaussianInput::new(&molecule);
    settings.gaussian().configure(&mut input);
    input.write(&output)?;
    println!("Gaussian input written to {}", output.display());
    Ok(())
}

fn run_xyz(rest: &[String]) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let source = Path::new(args.require(0, "Gaussian log")?);
    let output = args
        .positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| source.with_extension("xyz"));

    let log = GaussianLog::from_file(source)?;
    if log.frames().is_empty() {
        return Err(format!("no geometry in {}", source.display()).into());
    }
    io::write_xyz_trajectory(log.frames(), &output)?;
    println!("{} frames written to {}", log.frames().len(), output.display());
    Ok(())
}

fn run_create_settings_template(rest: &[String]) -> CliResult {
    let args = Args::parse(rest, &[])?;
    let path = Path::new(args.require(0, "settings file name")?);
    SettingsManager::create_template(path)?;
    println!("Settings template created: {}", path.display());
    Ok(())
}
