#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use crate::args::{ExportMethodType, OutputConfig, RunConfig};
    use crate::error::FlowTagError;
    use crate::lookup::{LookupIndex, UNTAGGED};
    use crate::output::render_report;
    use crate::pipeline::{run, Pipeline, RunStats};
    use crate::protocols::ProtocolTable;
    use crate::records::flow_record::Validation;

    const LOOKUP: &str = "dstport,protocol,tag\n80,tcp,sv_P1\n443,tcp,sv_P2\n";

    fn flow_line(dstport: u16, protocol: u8) -> String {
        format!(
            "2 123456789012 eni-0a1b2c3d 10.0.1.201 198.51.100.2 49153 {} {} 25 20000 1620140761 1620140821 ACCEPT OK\n",
            dstport, protocol
        )
    }

    fn setup_pipeline(validation: Validation) -> Pipeline {
        Pipeline::new(
            ProtocolTable::iana().unwrap(),
            LookupIndex::from_reader(LOOKUP.as_bytes(), true).unwrap(),
            validation,
        )
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowtag-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_single_matching_record() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let (aggregate, stats) = pipeline.process(flow_line(80, 6).as_bytes()).unwrap();

        assert_eq!(aggregate.tag_count("sv_P1"), 1);
        assert_eq!(aggregate.tag_count("sv_P2"), 0);
        assert_eq!(aggregate.tag_count(UNTAGGED), 0);
        assert_eq!(aggregate.port_protocol_count(80, "tcp"), Some(1));
        assert_eq!(aggregate.port_protocol_count(443, "tcp"), Some(0));
        assert_eq!(
            stats,
            RunStats {
                lines: 1,
                classified: 1,
                malformed: 0
            }
        );
    }

    #[test]
    fn test_unmatched_record_is_untagged() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let (aggregate, _) = pipeline.process(flow_line(9999, 17).as_bytes()).unwrap();

        assert_eq!(aggregate.tag_count(UNTAGGED), 1);
        assert_eq!(aggregate.port_protocol_count(9999, "udp"), Some(1));
        assert_eq!(aggregate.port_protocol_count(80, "tcp"), Some(0));
    }

    #[test]
    fn test_unknown_protocol_is_untagged() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let (aggregate, _) = pipeline.process(flow_line(80, 200).as_bytes()).unwrap();

        assert_eq!(aggregate.tag_count(UNTAGGED), 1);
        assert_eq!(aggregate.tag_count("sv_P1"), 0);
        assert_eq!(aggregate.port_protocol_count(80, "unassigned"), Some(1));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let input = format!(
            "{}2 123456789012 eni-0a1b2c3d 10.0.1.201\n{}\n   \n{}{}",
            flow_line(80, 6),
            flow_line(80, 6).trim_end().replace(" 80 ", " http "),
            flow_line(443, 6),
            flow_line(23, 6),
        );
        let (aggregate, stats) = pipeline.process(input.as_bytes()).unwrap();

        assert_eq!(
            stats,
            RunStats {
                lines: 6,
                classified: 3,
                malformed: 3
            }
        );
        assert_eq!(aggregate.total(), stats.classified);
        assert_eq!(aggregate.tag_count("sv_P1"), 1);
        assert_eq!(aggregate.tag_count("sv_P2"), 1);
        assert_eq!(aggregate.tag_count(UNTAGGED), 1);
    }

    #[test]
    fn test_blank_lines_are_malformed() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let input = format!("{}\n   \n{}", flow_line(80, 6), flow_line(443, 6));
        let (aggregate, stats) = pipeline.process(input.as_bytes()).unwrap();

        assert_eq!(
            stats,
            RunStats {
                lines: 4,
                classified: 2,
                malformed: 2
            }
        );
        assert_eq!(aggregate.total(), 2);
        assert_eq!(aggregate.tag_count(UNTAGGED), 0);
    }

    #[test]
    fn test_invalid_utf8_line_is_malformed() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(flow_line(80, 6).as_bytes());
        let (aggregate, stats) = pipeline.process(input.as_slice()).unwrap();

        assert_eq!(stats.malformed, 1);
        assert_eq!(aggregate.tag_count("sv_P1"), 1);
    }

    #[test]
    fn test_strict_mode_rejects_bad_action() {
        let input = format!("{}{}", flow_line(80, 6), flow_line(80, 6).replace("ACCEPT", "DROP"));

        let (lenient, _) = setup_pipeline(Validation::Lenient)
            .process(input.as_bytes())
            .unwrap();
        let (strict, stats) = setup_pipeline(Validation::Strict)
            .process(input.as_bytes())
            .unwrap();

        assert_eq!(lenient.tag_count("sv_P1"), 2);
        assert_eq!(strict.tag_count("sv_P1"), 1);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_processing_is_idempotent() {
        let input: String = [(80, 6), (9999, 17), (443, 6), (53, 17), (80, 6)]
            .iter()
            .map(|(port, protocol)| flow_line(*port, *protocol))
            .collect();

        let pipeline = setup_pipeline(Validation::Lenient);
        let (first, _) = pipeline.process(input.as_bytes()).unwrap();
        let (second, _) = setup_pipeline(Validation::Lenient)
            .process(input.as_bytes())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            render_report(&first).unwrap(),
            render_report(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_flow_log_is_unavailable() {
        let pipeline = setup_pipeline(Validation::Lenient);
        let err = pipeline
            .process_path(&PathBuf::from("/nonexistent/flow_logs.txt"))
            .unwrap_err();
        assert!(matches!(err, FlowTagError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_run_writes_report() {
        let dir = scratch_dir("run");
        let lookup_table = dir.join("lookup_table.csv");
        let flow_logs = dir.join("flow_logs.txt");
        let export_path = dir.join("report.csv");
        fs::write(&lookup_table, LOOKUP).unwrap();
        fs::write(&flow_logs, format!("{}{}", flow_line(80, 6), flow_line(9999, 17))).unwrap();

        let config = RunConfig {
            lookup_table,
            flow_logs,
            ..RunConfig::default()
        };
        let output = OutputConfig {
            output: ExportMethodType::Csv,
            export_path: Some(export_path.clone()),
        };

        let stats = run(&config, &output).unwrap();
        assert_eq!(stats.classified, 2);

        let report = fs::read_to_string(&export_path).unwrap();
        assert!(report.starts_with("Tag Counts:\nTag,Count\nsv_P1,1\nsv_P2,0\nUntagged,1\n\n"));
        assert!(report.ends_with("80,tcp,1\n443,tcp,0\n9999,udp,1\n"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_without_inputs_writes_nothing() {
        let dir = scratch_dir("missing");
        let export_path = dir.join("report.csv");
        fs::write(dir.join("lookup_table.csv"), LOOKUP).unwrap();

        let config = RunConfig {
            lookup_table: dir.join("lookup_table.csv"),
            flow_logs: dir.join("absent.txt"),
            ..RunConfig::default()
        };
        let output = OutputConfig {
            output: ExportMethodType::Csv,
            export_path: Some(export_path.clone()),
        };

        assert!(run(&config, &output).is_err());
        assert!(!export_path.exists());

        let config = RunConfig {
            lookup_table: dir.join("absent.csv"),
            ..config
        };
        assert!(run(&config, &output).is_err());
        assert!(!export_path.exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
