mod aggregation_test;
mod audit_test;
mod replication_test;
