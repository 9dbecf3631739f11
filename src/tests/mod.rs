mod report_roundtrip_tests;
