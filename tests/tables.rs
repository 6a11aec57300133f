//! Table layouts: every layout must decode back to the DFA it came from,
//! under any compression tuning, and survive a trip through disk formats.

use lexgen::{
    Pattern, RuleDef, RuleSet, ScanConfig, TableKind,
    config::CompressionTuning,
    pattern::StartConditionDef,
    tables::{self, Layout, full::FullSpeedStep},
};

/// Identifiers, numbers, operators, strings and comments.
fn c_like_rules() -> RuleSet {
    let ident_start = [(b'a', b'z'), (b'A', b'Z'), (b'_', b'_')];
    let ident_rest = [(b'a', b'z'), (b'A', b'Z'), (b'_', b'_'), (b'0', b'9')];
    let mut rules = vec![];
    for kw in ["if", "else", "while", "for", "return", "int", "char"] {
        rules.push(RuleDef::new(Pattern::lit(kw)));
    }
    rules.push(RuleDef::new(Pattern::Seq(vec![
        Pattern::class(&ident_start),
        Pattern::star(Pattern::class(&ident_rest)),
    ])));
    rules.push(RuleDef::new(Pattern::plus(Pattern::range(b'0', b'9'))));
    rules.push(RuleDef::new(Pattern::Seq(vec![
        Pattern::lit("0x"),
        Pattern::plus(Pattern::class(&[(b'0', b'9'), (b'a', b'f'), (b'A', b'F')])),
    ])));
    for op in ["==", "!=", "<=", ">=", "&&", "||", "++", "--", "->"] {
        rules.push(RuleDef::new(Pattern::lit(op)));
    }
    rules.push(RuleDef::new(Pattern::class(&[
        (b'+', b'+'),
        (b'-', b'-'),
        (b'*', b'*'),
        (b'/', b'/'),
        (b'(', b')'),
        (b'{', b'{'),
        (b'}', b'}'),
        (b';', b';'),
        (b'=', b'='),
    ])));
    rules.push(RuleDef::new(Pattern::Seq(vec![
        Pattern::lit("\""),
        Pattern::star(Pattern::not_class(&[(b'"', b'"'), (b'\n', b'\n')])),
        Pattern::lit("\""),
    ])));
    rules.push(RuleDef::new(Pattern::plus(Pattern::class(&[
        (b' ', b' '),
        (b'\t', b'\t'),
        (b'\n', b'\n'),
    ]))));
    rules.push(RuleDef::new(Pattern::lit("/*")).in_start_conditions(&["INITIAL"]));
    rules.push(RuleDef::new(Pattern::lit("*/")).in_start_conditions(&["COMMENT"]));
    rules.push(
        RuleDef::new(Pattern::plus(Pattern::not_class(&[(b'*', b'*')])))
            .in_start_conditions(&["COMMENT"]),
    );
    rules.push(RuleDef::new(Pattern::lit("*")).in_start_conditions(&["COMMENT"]));
    rules.push(RuleDef::new(Pattern::lit("x")).with_trailing(Pattern::lit("=")));
    rules.push(RuleDef::new(Pattern::Any));

    RuleSet {
        start_conditions: vec![StartConditionDef {
            name: "COMMENT".into(),
            exclusive: true,
        }],
        rules,
    }
}

fn assert_tables_match(cfg: ScanConfig, what: &str) -> lexgen::Compiled {
    let compiled = c_like_rules()
        .compile(cfg)
        .unwrap_or_else(|e| panic!("[{what}] compile failed: {e}"));
    let bad = tables::verify(&compiled.dfa, &compiled.tables);
    assert!(
        bad.is_empty(),
        "[{what}] {} mismatches, first {:?}",
        bad.len(),
        bad.first()
    );
    compiled
}

#[test]
fn every_layout_decodes_back_to_the_dfa() {
    let cases = [
        ("compressed", ScanConfig::default()),
        (
            "no-mecs",
            ScanConfig {
                use_mecs: false,
                ..ScanConfig::default()
            },
        ),
        (
            "no-ecs",
            ScanConfig {
                use_ecs: false,
                use_mecs: false,
                ..ScanConfig::default()
            },
        ),
        (
            "7-bit",
            ScanConfig {
                csize: 128,
                ..ScanConfig::default()
            },
        ),
        ("full", ScanConfig::full()),
        ("full-speed", ScanConfig::full_speed()),
    ];
    for (what, cfg) in cases {
        let kind = cfg.tables;
        let c = assert_tables_match(cfg, what);
        let name = match kind {
            TableKind::Compressed => "compressed",
            TableKind::Full => "full",
            TableKind::FullSpeed => "full-speed",
        };
        assert_eq!(c.tables.layout_name(), name);
    }
}

#[test]
fn compression_tuning_never_changes_meaning() {
    let d = CompressionTuning::default();
    let tunings = [
        CompressionTuning {
            template_same_percentage: 0,
            ..d.clone()
        },
        CompressionTuning {
            template_same_percentage: 101,
            ..d.clone()
        },
        CompressionTuning {
            max_protos: 1,
            ..d.clone()
        },
        CompressionTuning {
            max_protos: 2,
            first_match_diff_percentage: 100,
            ..d.clone()
        },
        CompressionTuning {
            proto_size_percentage: 0,
            new_proto_diff_percentage: 0,
            ..d.clone()
        },
        CompressionTuning {
            interior_fit_percentage: 100,
            acceptable_diff_percentage: 100,
            ..d.clone()
        },
        CompressionTuning {
            check_com_percentage: 0,
            one_stack_size: 2,
            ..d.clone()
        },
    ];
    for (i, tuning) in tunings.into_iter().enumerate() {
        for use_mecs in [true, false] {
            let cfg = ScanConfig {
                use_mecs,
                tuning: tuning.clone(),
                ..ScanConfig::default()
            };
            assert_tables_match(cfg, &format!("tuning #{i} mecs={use_mecs}"));
        }
    }
}

#[test]
fn full_speed_interior_fit_limit_is_only_a_size_knob() {
    for limit in [0, 1, 4, 1000] {
        let mut cfg = ScanConfig::full_speed();
        cfg.tuning.max_xtions_full_interior_fit = limit;
        assert_tables_match(cfg, &format!("full-speed fit {limit}"));
    }
}

#[test]
fn compressed_jam_and_end_of_buffer_entries() {
    let c = assert_tables_match(ScanConfig::default(), "compressed");
    let Layout::Compressed(ct) = &c.tables.layout else {
        panic!("expected compressed tables");
    };
    let eob = c.dfa.end_of_buffer_state.unwrap();
    assert_eq!(ct.jamstate, ct.lastdfa + 1);
    assert_eq!(ct.lastdfa, c.dfa.lastdfa());
    assert_eq!(ct.next_state(1, 0), Some(eob));
    assert!(ct.is_jam(ct.next_state(eob, 0).unwrap()));
    // Only `.` matches a control byte from the initial state.
    let any_state = ct.next_state(1, c.tables.ec_of(0x01)).unwrap();
    assert!(!ct.is_jam(any_state));
    assert!(ct.is_jam(ct.next_state(any_state, c.tables.ec_of(0x01)).unwrap()));
}

#[test]
fn full_speed_rows_carry_their_actions() {
    let c = assert_tables_match(ScanConfig::full_speed(), "full-speed");
    let Layout::FullSpeed(fs) = &c.tables.layout else {
        panic!("expected full-speed tables");
    };
    assert_eq!(c.dfa.end_of_buffer_state, None);
    assert_eq!(fs.action(fs.eob_base), Some(c.tables.end_of_buffer_action));
    let start = c.tables.start_states[0];
    assert_eq!(start, fs.base[1]);
    assert_eq!(fs.step(start, 0), Some(FullSpeedStep::Row(fs.eob_base)));
    assert_eq!(fs.step(fs.eob_base, 0), Some(FullSpeedStep::Jam));
}

#[test]
fn full_table_rows_are_dense() {
    let c = assert_tables_match(ScanConfig::full(), "full");
    let Layout::Full(ft) = &c.tables.layout else {
        panic!("expected full tables");
    };
    assert_eq!(ft.width, c.dfa.numecs + 1);
    assert_eq!(ft.nxt.len() as u32, (c.dfa.lastdfa() + 1) * ft.width);
    assert_eq!(ft.get(1, ft.width), None);
}

#[test]
fn json_round_trip_keeps_every_layout() {
    for cfg in [ScanConfig::default(), ScanConfig::full(), ScanConfig::full_speed()] {
        let c = c_like_rules().compile(cfg).unwrap();
        let json = tables::tables_to_json_string(&c.tables).unwrap();
        let back = tables::load_tables_json_bytes(json.as_bytes()).unwrap();
        assert_eq!(back, c.tables);
        assert!(tables::verify(&c.dfa, &back).is_empty());
    }
}

#[test]
fn binary_round_trip_keeps_every_layout() {
    let reject = ScanConfig {
        reject: true,
        ..ScanConfig::default()
    };
    for cfg in [
        ScanConfig::default(),
        reject,
        ScanConfig::full(),
        ScanConfig::full_speed(),
    ] {
        let c = c_like_rules().compile(cfg).unwrap();
        let mut buf = Vec::new();
        tables::encode_tables_bin(&c.tables, &mut buf).unwrap();
        assert_eq!(&buf[..8], b"LXSCAN01");
        let back = tables::load_tables_bin_bytes(&buf).unwrap();
        assert_eq!(back, c.tables);
    }
}

#[test]
fn binary_loader_rejects_damaged_input() {
    let c = c_like_rules().compile(ScanConfig::default()).unwrap();
    let mut buf = Vec::new();
    tables::encode_tables_bin(&c.tables, &mut buf).unwrap();

    let mut bad_magic = buf.clone();
    bad_magic[0] = b'X';
    assert!(tables::load_tables_bin_bytes(&bad_magic).is_err());

    assert!(tables::load_tables_bin_bytes(&buf[..buf.len() - 3]).is_err());
    assert!(tables::load_tables_bin_bytes(&buf[..20]).is_err());

    let mut trailing = buf.clone();
    trailing.extend_from_slice(&[0, 0, 0, 0]);
    assert!(tables::load_tables_bin_bytes(&trailing).is_err());
}

#[test]
fn json_loader_rejects_garbage() {
    assert!(tables::load_tables_json_bytes(b"{\"numecs\": 3}").is_err());
    assert!(tables::load_tables_json_bytes(b"not json").is_err());
}

#[test]
fn save_and_reload_from_disk() {
    let c = c_like_rules().compile(ScanConfig::default()).unwrap();
    let dir = std::env::temp_dir().join(format!("lexgen-tables-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let json = dir.join("scanner.json");
    tables::save_tables_json(&json, &c.tables).unwrap();
    let back = tables::load_tables_json_bytes(&std::fs::read(&json).unwrap()).unwrap();
    assert_eq!(back, c.tables);

    let bin = dir.join("scanner.bin");
    tables::save_tables_bin(&bin, &c.tables).unwrap();
    let back = tables::load_tables_bin_bytes(&std::fs::read(&bin).unwrap()).unwrap();
    assert_eq!(back, c.tables);

    let _ = std::fs::remove_dir_all(&dir);
}
