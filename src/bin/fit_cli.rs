fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    if let Err(err) = native::run() {
        eprintln!("fit_cli error: {err}");
        std::process::exit(1);
    }
}

mod native {
    use lanefit_engine::geom::{
        ApproximatorOptions, AssociationMethod, BSplineGridApproximator, CatmullRomSplineList,
        CentripetalCatmullRomSpline, FitDiagnostics, GridFitOptions, Point3, PointOrdering,
        PointSet, Residual, fit_all_methods, order_along_principal_axis,
    };
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use serde::Serialize;

    const SEED: u64 = 0x1a4e_f17;
    const GRID_RESOLUTION: usize = 5;
    const SAMPLES_PER_SEGMENT: usize = 20;
    const DEFAULT_SAMPLES: usize = 100;

    const USAGE: &str = r"fit_cli (lanefit-engine)

USAGE:
  fit_cli list
  fit_cli run <scenario|all> [options]

SCENARIOS:
  lane_curve
  lane_noisy
  s_curve_3d
  unordered_lane

OPTIONS (run):
  --samples <n>   Samples drawn from each fitted curve (default 100)
  --json          Print the report as JSON
  -h, --help      Show this help

Set RUST_LOG=debug to trace fit iterations.
";

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                for scenario in Scenario::ALL {
                    println!("{}", scenario.name());
                }
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut samples = DEFAULT_SAMPLES;
        let mut json = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--samples" => {
                    let value = args.value("--samples")?;
                    samples = value
                        .parse()
                        .map_err(|e| format!("invalid --samples `{value}`: {e}"))?;
                }
                "--json" => json = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let scenarios: Vec<Scenario> = if scenario_name == "all" {
            Scenario::ALL.to_vec()
        } else {
            vec![Scenario::from_name(&scenario_name).ok_or_else(|| {
                format!("unknown scenario `{scenario_name}` (try `fit_cli list`)")
            })?]
        };

        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(run_scenario(scenario, samples)?);
        }

        if json {
            let text = serde_json::to_string_pretty(&reports)
                .map_err(|e| format!("serialize report: {e}"))?;
            println!("{text}");
        } else {
            for report in &reports {
                print_report(report);
            }
        }
        Ok(())
    }

    #[derive(Debug, Serialize)]
    struct ScenarioReport {
        scenario: &'static str,
        point_count: usize,
        dims: usize,
        worker_threads: usize,
        methods: Vec<MethodReport>,
        grid: GridReport,
        interpolants: Vec<InterpolantReport>,
    }

    #[derive(Debug, Serialize)]
    struct MethodReport {
        method: AssociationMethod,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<FitDiagnostics>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        sampled: usize,
    }

    #[derive(Debug, Serialize)]
    struct GridReport {
        resolution: usize,
        residual: Residual,
        sampled: usize,
    }

    #[derive(Debug, Serialize)]
    struct InterpolantReport {
        name: String,
        control_points: usize,
        sampled: usize,
        max_turn_deg: f64,
    }

    fn run_scenario(scenario: Scenario, samples: usize) -> Result<ScenarioReport, String> {
        let points = scenario.points()?;
        let options = ApproximatorOptions::default().with_ordering(scenario.ordering());

        let methods = fit_all_methods(&points, &options)
            .into_iter()
            .map(|(method, result)| match result {
                Ok((curve, diagnostics)) => MethodReport {
                    method,
                    diagnostics: Some(diagnostics),
                    error: None,
                    sampled: curve.get_points_final(samples).len(),
                },
                Err(err) => MethodReport {
                    method,
                    diagnostics: None,
                    error: Some(err.to_string()),
                    sampled: 0,
                },
            })
            .collect();

        let grid_approximator = BSplineGridApproximator::new(
            GridFitOptions::default()
                .with_resolution(GRID_RESOLUTION)
                .with_sample_count(samples),
        );
        let grid_fit = grid_approximator.fit(&points).map_err(|e| e.to_string())?;
        let grid_samples = grid_approximator
            .global_optimize(&points, GRID_RESOLUTION)
            .map_err(|e| e.to_string())?;

        let controls = pick_control_points(&points, 6)?;
        let mut interpolants = Vec::new();
        for tau in [0.5, 0.1] {
            let spline = CatmullRomSplineList::new(&controls, tau).map_err(|e| e.to_string())?;
            let sampled = spline.get_points(SAMPLES_PER_SEGMENT).map_err(|e| e.to_string())?;
            interpolants.push(InterpolantReport {
                name: format!("catmull_rom(tau={tau})"),
                control_points: controls.len(),
                sampled: sampled.len(),
                max_turn_deg: max_turn_deg(sampled.points()),
            });
        }
        let centripetal =
            CentripetalCatmullRomSpline::new(&controls, 0.5).map_err(|e| e.to_string())?;
        let sampled = centripetal
            .get_points(SAMPLES_PER_SEGMENT)
            .map_err(|e| e.to_string())?;
        interpolants.push(InterpolantReport {
            name: "centripetal(alpha=0.5)".to_string(),
            control_points: controls.len(),
            sampled: sampled.len(),
            max_turn_deg: max_turn_deg(sampled.points()),
        });

        Ok(ScenarioReport {
            scenario: scenario.name(),
            point_count: points.len(),
            dims: points.dims(),
            worker_threads: lanefit_engine::worker_threads(),
            methods,
            grid: GridReport {
                resolution: GRID_RESOLUTION,
                residual: grid_fit.residual,
                sampled: grid_samples.len(),
            },
            interpolants,
        })
    }

    fn print_report(report: &ScenarioReport) {
        println!(
            "== {} ({} points, {}D) ==",
            report.scenario, report.point_count, report.dims
        );
        for method in &report.methods {
            match (&method.diagnostics, &method.error) {
                (Some(diagnostics), _) => {
                    println!("  {:<13} {diagnostics}", method.method.name());
                    if diagnostics.iterations > 0 {
                        println!(
                            "  {:<13} mean residual improved {:.1}%",
                            "",
                            100.0 * diagnostics.improvement()
                        );
                    }
                    if let Some(timing) = &diagnostics.timing {
                        println!("  {:<13} {:.3} ms", "", timing.total_ms());
                    }
                }
                (None, Some(error)) => println!("  {:<13} failed: {error}", method.method.name()),
                (None, None) => {}
            }
        }
        println!(
            "  grid(res={})   residual mean {:.6} max {:.6}, {} samples",
            report.grid.resolution,
            report.grid.residual.mean,
            report.grid.residual.max,
            report.grid.sampled
        );
        for interpolant in &report.interpolants {
            println!(
                "  {:<24} {} control points -> {} samples, max turn {:.2} deg",
                interpolant.name,
                interpolant.control_points,
                interpolant.sampled,
                interpolant.max_turn_deg
            );
        }
        println!();
    }

    /// Evenly spaced subset of `count` samples, ends included.
    fn pick_control_points(points: &PointSet, count: usize) -> Result<PointSet, String> {
        let ordered = order_for_display(points);
        let last = ordered.len() - 1;
        let picked: Vec<Point3> = (0..count)
            .map(|i| ordered[i * last / (count - 1)])
            .collect();
        PointSet::new(picked, points.dims()).map_err(|e| e.to_string())
    }

    fn order_for_display(points: &PointSet) -> Vec<Point3> {
        points
            .reordered(&order_along_principal_axis(points))
            .into_points()
    }

    /// Largest angle between consecutive polyline segments.
    fn max_turn_deg(points: &[Point3]) -> f64 {
        points
            .windows(3)
            .filter_map(|w| {
                let a = w[1].sub_point(w[0]).normalized()?;
                let b = w[2].sub_point(w[1]).normalized()?;
                Some(a.dot(b).clamp(-1.0, 1.0).acos().to_degrees())
            })
            .fold(0.0, f64::max)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        LaneCurve,
        LaneNoisy,
        SCurve3d,
        UnorderedLane,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::LaneCurve,
            Scenario::LaneNoisy,
            Scenario::SCurve3d,
            Scenario::UnorderedLane,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::LaneCurve => "lane_curve",
                Scenario::LaneNoisy => "lane_noisy",
                Scenario::SCurve3d => "s_curve_3d",
                Scenario::UnorderedLane => "unordered_lane",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }

        fn ordering(self) -> PointOrdering {
            match self {
                Scenario::UnorderedLane => PointOrdering::PrincipalAxis,
                _ => PointOrdering::AsGiven,
            }
        }

        fn points(self) -> Result<PointSet, String> {
            let mut rng = StdRng::seed_from_u64(SEED);
            let set = match self {
                Scenario::LaneCurve => PointSet::from_xy(&lane_rows(&mut rng, 0.0)),
                Scenario::LaneNoisy => PointSet::from_xy(&lane_rows(&mut rng, 0.15)),
                Scenario::UnorderedLane => {
                    let mut rows = lane_rows(&mut rng, 0.15);
                    rows.shuffle(&mut rng);
                    PointSet::from_xy(&rows)
                }
                Scenario::SCurve3d => {
                    let rows: Vec<[f64; 3]> = (0..80)
                        .map(|i| {
                            let t = f64::from(i) / 79.0;
                            let a = std::f64::consts::PI * (2.0 * t - 1.0);
                            [30.0 * t, 4.0 * a.sin(), 2.0 * (1.0 - a.cos())]
                        })
                        .collect();
                    PointSet::from_xyz(&rows)
                }
            };
            set.map_err(|e| e.to_string())
        }
    }

    /// Gently curving 100 m lane marking sampled every metre.
    fn lane_rows(rng: &mut StdRng, noise: f64) -> Vec<[f64; 2]> {
        (0..=100)
            .map(|i| {
                let x = f64::from(i);
                let y = 0.002 * x * x + 1.5 * (x / 15.0).sin();
                if noise > 0.0 {
                    [
                        x + rng.random_range(-noise..noise),
                        y + rng.random_range(-noise..noise),
                    ]
                } else {
                    [x, y]
                }
            })
            .collect()
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
