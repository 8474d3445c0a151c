pub mod georss_collect;
