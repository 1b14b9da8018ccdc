pub mod flow_record;
