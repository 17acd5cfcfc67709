//! GPU Radix Sort Backend using Metal
//!
//! Dispatches the same five stages as the host pipeline (histogram,
//! local scan, block scan, coalesce, scatter) as Metal compute kernels,
//! one threadgroup per group with `wg_size` threads per group. Every
//! stage is submitted in its own command buffer and waited on before the
//! next stage is encoded: each stage's addressing is only correct given
//! the fully materialized output of the previous one, so no overlap or
//! pipelining across stages is permitted.
//!
//! Passes ping-pong between two device buffers; the histogram,
//! prefix-sum and block-sum buffers are transient and rewritten from
//! scratch every pass. The order checker runs as a separate pair of
//! kernels (adjacent compare, threadgroup tree reduction).
//!
//! All seven kernel functions are resolved into typed pipeline states
//! once at construction; a failed shader build surfaces the compiler
//! log verbatim. This module only compiles on macOS; on other platforms
//! a stub reporting [`crate::error::SortError::DeviceNotFound`] is
//! provided.

#[cfg(target_os = "macos")]
mod metal_impl {
    use metal::*;
    use std::mem;

    use crate::config::SortConfig;
    use crate::double_buffer::DoubleBuffer;
    use crate::error::SortError;
    use crate::stage::{Stage, StageObserver};

    /// Metal shader source for the sort and checker kernels.
    const SHADER_SOURCE: &str = include_str!("../shaders/radix_sort.metal");

    /// Threadgroup size for the order checker's reduction kernel.
    /// Must be a power of two.
    const REDUCE_TG_SIZE: usize = 256;

    /// Per-pass scalar parameters. Must match `SortParams` in the shader.
    #[repr(C)]
    #[derive(Clone, Copy)]
    struct SortParams {
        shift: u32,
        mask: u32,
        n_groups: u32,
        wg_size: u32,
        elems_per_worker: u32,
    }

    /// Multi-pass radix sorter running on the system's Metal device.
    pub struct GpuRadixSorter {
        config: SortConfig,
        device: Device,
        command_queue: CommandQueue,
        histogram_pipeline: ComputePipelineState,
        local_scan_pipeline: ComputePipelineState,
        block_scan_pipeline: ComputePipelineState,
        coalesce_pipeline: ComputePipelineState,
        scatter_pipeline: ComputePipelineState,
        compare_pipeline: ComputePipelineState,
        reduce_pipeline: ComputePipelineState,
        max_threadgroup_size: usize,
    }

    impl GpuRadixSorter {
        /// Acquire the system device, compile the kernel program, and
        /// resolve all kernel functions into pipeline states.
        pub fn new(config: SortConfig) -> Result<Self, SortError> {
            let device = Device::system_default().ok_or(SortError::DeviceNotFound)?;
            let command_queue = device.new_command_queue();

            let options = CompileOptions::new();
            let library = device
                .new_library_with_source(SHADER_SOURCE, &options)
                .map_err(|log| SortError::ShaderCompilation(log.to_string()))?;

            let pipeline = |name: &str| -> Result<ComputePipelineState, SortError> {
                let function = library
                    .get_function(name, None)
                    .map_err(|e| SortError::ShaderCompilation(format!("{}: {}", name, e)))?;
                device
                    .new_compute_pipeline_state_with_function(&function)
                    .map_err(|e| SortError::ShaderCompilation(format!("{}: {}", name, e)))
            };

            let histogram_pipeline = pipeline("radix_histogram")?;
            let local_scan_pipeline = pipeline("radix_scan_local")?;
            let block_scan_pipeline = pipeline("radix_scan_blocks")?;
            let coalesce_pipeline = pipeline("radix_coalesce")?;
            let scatter_pipeline = pipeline("radix_scatter")?;
            let compare_pipeline = pipeline("order_compare")?;
            let reduce_pipeline = pipeline("order_reduce")?;

            let max_threadgroup_size =
                histogram_pipeline.max_total_threads_per_threadgroup() as usize;

            Ok(Self {
                config,
                device,
                command_queue,
                histogram_pipeline,
                local_scan_pipeline,
                block_scan_pipeline,
                coalesce_pipeline,
                scatter_pipeline,
                compare_pipeline,
                reduce_pipeline,
                max_threadgroup_size,
            })
        }

        pub fn config(&self) -> &SortConfig {
            &self.config
        }

        /// Name of the device the kernels run on.
        pub fn device_name(&self) -> String {
            self.device.name().to_string()
        }

        /// Sort the given keys in ascending order on the GPU.
        pub fn sort(&self, data: &mut [i32]) -> Result<(), SortError> {
            self.run(data, None)
        }

        /// Sort with an instrumentation hook that receives a read-back
        /// of each stage's output buffer after the stage completes.
        pub fn sort_with_observer(
            &self,
            data: &mut [i32],
            observer: &mut StageObserver<'_>,
        ) -> Result<(), SortError> {
            self.run(data, Some(observer))
        }

        fn run(
            &self,
            data: &mut [i32],
            mut observer: Option<&mut StageObserver<'_>>,
        ) -> Result<(), SortError> {
            if data.len() <= 1 {
                return Ok(());
            }
            let config = &self.config;
            config.validate_len(data.len())?;

            let n = data.len();
            if config.wg_size() > self.max_threadgroup_size {
                return Err(SortError::Dispatch {
                    stage: Stage::Histogram,
                    pass: 0,
                    reason: format!(
                        "WG_SIZE {} exceeds device threadgroup limit {}",
                        config.wg_size(),
                        self.max_threadgroup_size
                    ),
                });
            }

            let flip = config.key_flip();
            let keys: Vec<u32> = data.iter().map(|&k| (k as u32) ^ flip).collect();

            let key_bytes = (n * mem::size_of::<u32>()) as u64;
            let mut buffers = DoubleBuffer::new(
                self.device.new_buffer_with_data(
                    keys.as_ptr() as *const _,
                    key_bytes,
                    MTLResourceOptions::StorageModeShared,
                ),
                self.device
                    .new_buffer(key_bytes, MTLResourceOptions::StorageModeShared),
            );

            let table_len = config.histogram_len();
            let table_buffer = self.device.new_buffer(
                (table_len * mem::size_of::<u32>()) as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let block_sums_buffer = self.device.new_buffer(
                (config.n_groups() * mem::size_of::<u32>()) as u64,
                MTLResourceOptions::StorageModeShared,
            );

            let groups = MTLSize::new(config.n_groups() as u64, 1, 1);
            let workers = MTLSize::new(config.wg_size() as u64, 1, 1);
            let scan_tg_mem = (config.wg_size() * mem::size_of::<u32>()) as u64;

            for pass in 0..config.passes() {
                let params = SortParams {
                    shift: pass * config.radix(),
                    mask: config.mask(),
                    n_groups: config.n_groups() as u32,
                    wg_size: config.wg_size() as u32,
                    elems_per_worker: config.elems_per_worker(n) as u32,
                };
                let params_buffer = self.device.new_buffer_with_data(
                    &params as *const SortParams as *const _,
                    mem::size_of::<SortParams>() as u64,
                    MTLResourceOptions::StorageModeShared,
                );

                self.run_stage(Stage::Histogram, pass, |encoder| {
                    encoder.set_compute_pipeline_state(&self.histogram_pipeline);
                    encoder.set_buffer(0, Some(buffers.source()), 0);
                    encoder.set_buffer(1, Some(&table_buffer), 0);
                    encoder.set_buffer(2, Some(&params_buffer), 0);
                    encoder.dispatch_thread_groups(groups, workers);
                })?;
                if let Some(hook) = observer.as_deref_mut() {
                    hook(Stage::Histogram, pass, &read_u32(&table_buffer, table_len));
                }

                self.run_stage(Stage::LocalScan, pass, |encoder| {
                    encoder.set_compute_pipeline_state(&self.local_scan_pipeline);
                    encoder.set_buffer(0, Some(&table_buffer), 0);
                    encoder.set_buffer(1, Some(&block_sums_buffer), 0);
                    encoder.set_buffer(2, Some(&params_buffer), 0);
                    encoder.set_threadgroup_memory_length(0, scan_tg_mem);
                    encoder.dispatch_thread_groups(groups, workers);
                })?;
                if let Some(hook) = observer.as_deref_mut() {
                    hook(Stage::LocalScan, pass, &read_u32(&table_buffer, table_len));
                }

                self.run_stage(Stage::BlockScan, pass, |encoder| {
                    encoder.set_compute_pipeline_state(&self.block_scan_pipeline);
                    encoder.set_buffer(0, Some(&block_sums_buffer), 0);
                    encoder.set_buffer(1, Some(&params_buffer), 0);
                    encoder
                        .dispatch_thread_groups(MTLSize::new(1, 1, 1), MTLSize::new(1, 1, 1));
                })?;
                if let Some(hook) = observer.as_deref_mut() {
                    hook(
                        Stage::BlockScan,
                        pass,
                        &read_u32(&block_sums_buffer, config.n_groups()),
                    );
                }

                self.run_stage(Stage::Coalesce, pass, |encoder| {
                    encoder.set_compute_pipeline_state(&self.coalesce_pipeline);
                    encoder.set_buffer(0, Some(&table_buffer), 0);
                    encoder.set_buffer(1, Some(&block_sums_buffer), 0);
                    encoder.set_buffer(2, Some(&params_buffer), 0);
                    let tg = REDUCE_TG_SIZE.min(self.max_threadgroup_size);
                    encoder.dispatch_threads(
                        MTLSize::new(table_len as u64, 1, 1),
                        MTLSize::new(tg as u64, 1, 1),
                    );
                })?;
                if let Some(hook) = observer.as_deref_mut() {
                    hook(Stage::Coalesce, pass, &read_u32(&table_buffer, table_len));
                }

                {
                    let (source, destination) = buffers.split_mut();
                    let destination = &*destination;
                    self.run_stage(Stage::Scatter, pass, |encoder| {
                        encoder.set_compute_pipeline_state(&self.scatter_pipeline);
                        encoder.set_buffer(0, Some(source), 0);
                        encoder.set_buffer(1, Some(destination), 0);
                        encoder.set_buffer(2, Some(&table_buffer), 0);
                        encoder.set_buffer(3, Some(&params_buffer), 0);
                        encoder.dispatch_thread_groups(groups, workers);
                    })?;
                }
                buffers.swap();
                if let Some(hook) = observer.as_deref_mut() {
                    hook(Stage::Scatter, pass, &read_u32(buffers.source(), n));
                }
            }

            let sorted = read_u32(buffers.source(), n);
            for (out, key) in data.iter_mut().zip(sorted) {
                *out = (key ^ flip) as i32;
            }
            Ok(())
        }

        /// Count adjacent inversions in `data` on the GPU.
        ///
        /// Returns 0 iff the array is non-decreasing.
        pub fn check_order(&self, data: &[i32]) -> Result<usize, SortError> {
            if data.len() < 2 {
                return Ok(0);
            }
            let tg = REDUCE_TG_SIZE.min(self.max_threadgroup_size);
            let n_flags = data.len() - 1;

            let keys_buffer = self.device.new_buffer_with_data(
                data.as_ptr() as *const _,
                (data.len() * mem::size_of::<i32>()) as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let flags_buffer = self.device.new_buffer(
                (n_flags * mem::size_of::<u32>()) as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let zero = 0u32;
            let result_buffer = self.device.new_buffer_with_data(
                &zero as *const u32 as *const _,
                mem::size_of::<u32>() as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let n_u32 = data.len() as u32;
            let n_buffer = self.device.new_buffer_with_data(
                &n_u32 as *const u32 as *const _,
                mem::size_of::<u32>() as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let flags_u32 = n_flags as u32;
            let flags_len_buffer = self.device.new_buffer_with_data(
                &flags_u32 as *const u32 as *const _,
                mem::size_of::<u32>() as u64,
                MTLResourceOptions::StorageModeShared,
            );

            self.run_stage(Stage::Compare, 0, |encoder| {
                encoder.set_compute_pipeline_state(&self.compare_pipeline);
                encoder.set_buffer(0, Some(&keys_buffer), 0);
                encoder.set_buffer(1, Some(&flags_buffer), 0);
                encoder.set_buffer(2, Some(&n_buffer), 0);
                encoder.dispatch_threads(
                    MTLSize::new(n_flags as u64, 1, 1),
                    MTLSize::new(tg as u64, 1, 1),
                );
            })?;

            // The reduction's stride halving needs every threadgroup at
            // its full power-of-two size; the kernel zero-fills lanes
            // past the flag count. Launch whole threadgroups, never a
            // trimmed edge group.
            self.run_stage(Stage::Reduce, 0, |encoder| {
                encoder.set_compute_pipeline_state(&self.reduce_pipeline);
                encoder.set_buffer(0, Some(&flags_buffer), 0);
                encoder.set_buffer(1, Some(&result_buffer), 0);
                encoder.set_buffer(2, Some(&flags_len_buffer), 0);
                encoder.set_threadgroup_memory_length(0, (tg * mem::size_of::<u32>()) as u64);
                encoder.dispatch_thread_groups(
                    MTLSize::new(n_flags.div_ceil(tg) as u64, 1, 1),
                    MTLSize::new(tg as u64, 1, 1),
                );
            })?;

            Ok(read_u32(&result_buffer, 1)[0] as usize)
        }

        /// Encode one stage into its own command buffer, submit it, and
        /// block until it completes. The full wait is the inter-stage
        /// barrier: the next stage is only encoded after every thread of
        /// this one has finished.
        fn run_stage<F>(&self, stage: Stage, pass: u32, encode: F) -> Result<(), SortError>
        where
            F: FnOnce(&ComputeCommandEncoderRef),
        {
            let command_buffer = self.command_queue.new_command_buffer();
            let encoder = command_buffer.new_compute_command_encoder();
            encode(encoder);
            encoder.end_encoding();
            command_buffer.commit();
            command_buffer.wait_until_completed();

            if command_buffer.status() == MTLCommandBufferStatus::Error {
                return Err(SortError::Execution {
                    stage,
                    pass,
                    reason: "command buffer completed with error status".to_string(),
                });
            }
            log::trace!("pass {}: {} complete", pass, stage);
            Ok(())
        }
    }

    /// Copy a device buffer back into host memory.
    fn read_u32(buffer: &BufferRef, len: usize) -> Vec<u32> {
        let mut out = vec![0u32; len];
        unsafe {
            std::ptr::copy_nonoverlapping(buffer.contents() as *const u32, out.as_mut_ptr(), len);
        }
        out
    }
}

#[cfg(target_os = "macos")]
pub use metal_impl::GpuRadixSorter;

#[cfg(not(target_os = "macos"))]
mod stub {
    use crate::config::SortConfig;
    use crate::error::SortError;
    use crate::stage::StageObserver;

    /// Stub compiled on platforms without Metal. Every constructor and
    /// operation reports that no device is available.
    pub struct GpuRadixSorter;

    impl GpuRadixSorter {
        pub fn new(_config: SortConfig) -> Result<Self, SortError> {
            Err(SortError::DeviceNotFound)
        }

        pub fn sort(&self, _data: &mut [i32]) -> Result<(), SortError> {
            Err(SortError::DeviceNotFound)
        }

        pub fn sort_with_observer(
            &self,
            _data: &mut [i32],
            _observer: &mut StageObserver<'_>,
        ) -> Result<(), SortError> {
            Err(SortError::DeviceNotFound)
        }

        pub fn check_order(&self, _data: &[i32]) -> Result<usize, SortError> {
            Err(SortError::DeviceNotFound)
        }

        pub fn device_name(&self) -> String {
            "N/A".to_string()
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub use stub::GpuRadixSorter;
